mod options;
mod orchestrator;
mod rate_limiter;
mod selector;

pub use options::{Progress, RunOptions, RunOutcome, RunState};
pub use orchestrator::Reindexer;
pub use rate_limiter::BatchRateLimiter;
pub use selector::resolve_selection;
