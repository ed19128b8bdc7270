mod actor;
mod field_changes;
pub mod metrics;
mod translator;

pub use actor::ActorClassifierConfig;
pub use field_changes::diff_top_level;
pub use translator::Translator;
