use std::sync::Arc;

use activity_database::PgColumnStore;
use activity_policy_cache::PolicyCache;
use activity_publisher::Publisher;
use activity_query::QueryEngine;
use activity_reindex::Reindexer;
use activity_translator::ActorClassifierConfig;

use crate::runs::RunRegistry;

pub struct AppState {
    pub reindexer: Arc<Reindexer<PgColumnStore>>,
    pub registry: Arc<RunRegistry>,
}

pub fn build_reindexer(
    engine: Arc<QueryEngine<PgColumnStore>>,
    cache: Arc<PolicyCache>,
    publisher: Arc<dyn Publisher>,
) -> Reindexer<PgColumnStore> {
    Reindexer::new(engine, cache, ActorClassifierConfig::default(), publisher)
}
