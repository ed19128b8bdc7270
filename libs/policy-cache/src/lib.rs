mod cache;
mod compile;
mod status;

pub use cache::{MatchOutcome, PolicyCache};
pub use compile::{policy_version, CompiledPolicy, CompiledRule};
pub use status::{CompileCause, PolicyStatus, RuleList};
