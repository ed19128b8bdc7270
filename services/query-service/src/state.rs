use std::sync::Arc;

use activity_database::PgColumnStore;
use activity_query::QueryEngine;

pub struct AppState {
    pub engine: Arc<QueryEngine<PgColumnStore>>,
}
