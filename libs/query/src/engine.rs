use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::RwLock;

use activity_common::AppError;
use activity_database::{ColumnStore, CursorPosition, StoreFilters, StoreKind, StoreRow};
use activity_expr::{compile, evaluate_predicate, Env, Program, ProgramKind};
use activity_models::{Activity, AuditRecord, EventRecord, Scope};

use crate::config::QueryConfig;
use crate::cursor::Cursor;
use crate::facet::{self, FacetResult, FacetSpec, FacetValue, DEFAULT_FACET_LIMIT, MAX_FACET_LIMIT};
use crate::spec::QuerySpec;

/// One decoded row, still tagged by kind. The engine never mixes kinds
/// within a single page -- callers pick a `StoreKind` up front.
#[derive(Debug, Clone)]
pub enum QueryItem {
    Audit(AuditRecord),
    Event(EventRecord),
    Activity(Activity),
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub continue_token: Option<String>,
}

/// Validates and executes [`QuerySpec`]s against a [`ColumnStore`],
/// enforcing tenant scope in-store and applying any `filter` expression as
/// an in-process post-filter. Compiled filter programs are cached by
/// source text in a bounded LRU so a repeated filter string across many
/// requests is compiled once.
pub struct QueryEngine<S: ColumnStore> {
    store: Arc<S>,
    config: QueryConfig,
    filter_cache: RwLock<LruCache<String, Arc<Program>>>,
}

impl<S: ColumnStore> QueryEngine<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        let capacity = NonZeroUsize::new(config.filter_cache_capacity.max(1)).unwrap();
        Self {
            store,
            config,
            filter_cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    async fn compiled_filter(&self, source: &str) -> Result<Arc<Program>, AppError> {
        if let Some(program) = self.filter_cache.write().await.get(source) {
            return Ok(program.clone());
        }
        let program = compile(ProgramKind::Predicate, source).map_err(|e| {
            AppError::validation(vec![activity_common::FieldError::invalid(
                "filter",
                e.to_string(),
            )])
        })?;
        let program = Arc::new(program);
        self.filter_cache
            .write()
            .await
            .put(source.to_string(), program.clone());
        Ok(program)
    }

    pub async fn query(
        &self,
        kind: StoreKind,
        spec: &QuerySpec,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> Result<Page<QueryItem>, AppError> {
        let validated = spec.validate(kind, &self.config, now)?;

        let filter_program = match &validated.filter {
            Some(source) => Some(self.compiled_filter(source).await?),
            None => None,
        };

        let limit = validated.limit;
        let filters = StoreFilters {
            scope,
            start_time: validated.start_time,
            end_time: validated.end_time,
            namespace: validated.namespace.clone(),
            change_source: validated.change_source.clone(),
            resource_kind: validated.resource_kind.clone(),
            resource_uid: validated.resource_uid.clone(),
            api_group: validated.api_group.clone(),
            actor_name: validated.actor_name.clone(),
            search: validated.search.clone(),
            after: validated.after.map(|after| CursorPosition {
                event_time: after.event_time,
                record_id: after.record_id,
            }),
            limit: limit + 1,
        };

        let raw_rows = self.query_with_retry(kind, &filters).await?;
        // For `StoreKind::Activity`, `raw_rows` has already been
        // newest-wins deduplicated by origin within this fetched window
        // (see the comment in `PgColumnStore::query_page`), so this count
        // can read low at a duplicate-heavy page boundary and end
        // pagination one page early rather than over-reading past `limit`.
        let has_more = raw_rows.len() > limit as usize;
        let page_rows = if has_more {
            &raw_rows[..limit as usize]
        } else {
            &raw_rows[..]
        };

        let continue_token = if has_more {
            page_rows.last().map(|row| {
                Cursor {
                    event_time: row.event_time(),
                    record_id: row.record_id().to_string(),
                    fingerprint: validated.fingerprint.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        let mut items = Vec::with_capacity(page_rows.len());
        for row in page_rows {
            let item = decode_row(row.clone())?;
            if let Some(program) = &filter_program {
                if !passes_filter(program, &item) {
                    continue;
                }
            }
            items.push(item);
        }

        Ok(Page {
            items,
            continue_token,
        })
    }

    /// One histogram per requested facet, in input order, each sorted by
    /// count descending and truncated to its (allowlisted) limit. `filter`
    /// on the spec is accepted but never applied -- see
    /// [`FacetSpec::filter`].
    pub async fn facet(
        &self,
        kind: StoreKind,
        spec: &FacetSpec,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<FacetResult>, AppError> {
        facet::validate_facet_count(&spec.facets)?;
        let time_range = facet::resolve_facet_time_range(spec, now)?;

        let mut results = Vec::with_capacity(spec.facets.len());
        for request in &spec.facets {
            let column = facet::resolve(kind, &request.field)?;
            let limit = request
                .limit
                .unwrap_or(DEFAULT_FACET_LIMIT)
                .clamp(1, MAX_FACET_LIMIT);
            let values = self
                .facet_with_retry(kind, column, &scope, time_range, limit)
                .await?
                .into_iter()
                .map(|(value, count)| FacetValue { value, count })
                .collect();
            results.push(FacetResult {
                field: request.field.clone(),
                values,
            });
        }
        Ok(results)
    }

    async fn facet_with_retry(
        &self,
        kind: StoreKind,
        column: &'static str,
        scope: &Scope,
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: i64,
    ) -> Result<Vec<(String, i64)>, AppError> {
        match self
            .store
            .count_facet_values(kind, column, scope, time_range, limit)
            .await
        {
            Ok(values) => Ok(values),
            Err(AppError::StorageTransient(_)) => {
                self.store
                    .count_facet_values(kind, column, scope, time_range, limit)
                    .await
            }
            Err(other) => Err(other),
        }
    }

    /// A single immediate retry on a transient storage fault, per §4.4's
    /// ambient storage-error policy. No backoff loop here -- re-index's
    /// rate limiter is the system's only throttle.
    async fn query_with_retry(
        &self,
        kind: StoreKind,
        filters: &StoreFilters,
    ) -> Result<Vec<StoreRow>, AppError> {
        match self.store.query_page(kind, filters).await {
            Ok(rows) => Ok(rows),
            Err(AppError::StorageTransient(_)) => self.store.query_page(kind, filters).await,
            Err(other) => Err(other),
        }
    }
}

fn decode_row(row: StoreRow) -> Result<QueryItem, AppError> {
    match row {
        StoreRow::Audit(row) => Ok(QueryItem::Audit(row.into_record()?)),
        StoreRow::Event(row) => Ok(QueryItem::Event(row.into_record()?)),
        StoreRow::Activity(row) => Ok(QueryItem::Activity(row.into_activity()?)),
    }
}

/// Evaluation failures (a malformed payload for this particular filter,
/// an unbound field) are treated the same as "did not match" -- the row
/// is dropped from the page, not the whole request.
fn passes_filter(program: &Program, item: &QueryItem) -> bool {
    let bound = match item {
        QueryItem::Audit(record) => serde_json::to_value(record).map(|v| ("audit", v)),
        QueryItem::Event(record) => serde_json::to_value(record).map(|v| ("event", v)),
        QueryItem::Activity(activity) => serde_json::to_value(activity).map(|v| ("activity", v)),
    };
    let (name, value) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            tracing::debug!(error = %e, "failed to serialize row for filtering, dropping row");
            return false;
        }
    };
    let env = Env::new().bind(name, value);
    match evaluate_predicate(program, &env) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::debug!(error = %e, "filter evaluation failed, dropping row");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_database::{ActivityRow, MockColumnStore};
    use activity_models::{Scope, ScopeType};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 29, 12, 0, 0).unwrap()
    }

    fn scope() -> Scope {
        Scope::new(ScopeType::Organization, "acme")
    }

    fn activity_row(id: &str, minutes_ago: i64) -> ActivityRow {
        let event_time = now() - chrono::Duration::minutes(minutes_ago);
        ActivityRow {
            id: id.to_string(),
            event_time,
            tenant_type: "organization".to_string(),
            tenant_name: "acme".to_string(),
            origin_id: format!("origin-{id}"),
            policy_version: "v1".to_string(),
            payload: serde_json::json!({
                "apiVersion": "activity.platform/v1",
                "kind": "Activity",
                "metadata": {
                    "name": id,
                    "uid": "00000000-0000-0000-0000-000000000001",
                    "creationTimestamp": event_time.to_rfc3339(),
                    "labels": {}
                },
                "spec": {
                    "summary": format!("activity {id}"),
                    "changeSource": "human",
                    "actor": {"type": "user", "name": "alice"},
                    "resource": {"kind": "Deployment", "name": "api-gateway"},
                    "links": [],
                    "tenant": {"type": "organization", "name": "acme"},
                    "changes": [],
                    "origin": {"type": "audit", "id": id}
                }
            }),
        }
    }

    fn base_spec() -> QuerySpec {
        QuerySpec {
            start_time: "now-24h".to_string(),
            end_time: "now".to_string(),
            limit: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn query_returns_a_continue_token_when_more_rows_exist() {
        let mut store = MockColumnStore::new();
        store.expect_query_page().returning(|_, filters| {
            assert_eq!(filters.limit, 2);
            Ok(vec![
                StoreRow::Activity(activity_row("a1", 1)),
                StoreRow::Activity(activity_row("a2", 2)),
            ])
        });
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());

        let page = engine
            .query(StoreKind::Activity, &base_spec(), scope(), now())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert!(page.continue_token.is_some());
    }

    #[tokio::test]
    async fn query_has_no_continue_token_on_the_last_page() {
        let mut store = MockColumnStore::new();
        store
            .expect_query_page()
            .returning(|_, _| Ok(vec![StoreRow::Activity(activity_row("a1", 1))]));
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());

        let page = engine
            .query(StoreKind::Activity, &base_spec(), scope(), now())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert!(page.continue_token.is_none());
    }

    #[tokio::test]
    async fn query_retries_once_on_transient_storage_error_then_succeeds() {
        let mut store = MockColumnStore::new();
        let mut calls = 0;
        store.expect_query_page().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(AppError::StorageTransient("connection reset".to_string()))
            } else {
                Ok(vec![StoreRow::Activity(activity_row("a1", 1))])
            }
        });
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());

        let page = engine
            .query(StoreKind::Activity, &base_spec(), scope(), now())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn query_surfaces_a_second_transient_failure() {
        let mut store = MockColumnStore::new();
        store
            .expect_query_page()
            .times(2)
            .returning(|_, _| Err(AppError::StorageTransient("still down".to_string())));
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());

        let err = engine
            .query(StoreKind::Activity, &base_spec(), scope(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageTransient(_)));
    }

    #[tokio::test]
    async fn filter_drops_rows_that_do_not_match_the_predicate() {
        let mut store = MockColumnStore::new();
        store.expect_query_page().returning(|_, _| {
            Ok(vec![
                StoreRow::Activity(activity_row("a1", 1)),
                StoreRow::Activity(activity_row("a2", 2)),
            ])
        });
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());
        let mut spec = base_spec();
        spec.limit = 10;
        spec.filter = Some(r#"activity.metadata.name == "a1""#.to_string());

        let page = engine
            .query(StoreKind::Activity, &spec, scope(), now())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn field_selector_drops_rows_that_do_not_match() {
        let mut store = MockColumnStore::new();
        store.expect_query_page().returning(|_, _| {
            Ok(vec![
                StoreRow::Activity(activity_row("a1", 1)),
                StoreRow::Activity(activity_row("a2", 2)),
            ])
        });
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());
        let mut spec = base_spec();
        spec.limit = 10;
        spec.field_selector = Some("spec.summary=activity a1".to_string());

        let page = engine
            .query(StoreKind::Activity, &spec, scope(), now())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn label_selector_on_a_non_activity_kind_is_a_validation_error() {
        let store = MockColumnStore::new();
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());
        let mut spec = base_spec();
        spec.label_selector = Some("team=platform".to_string());

        let err = engine
            .query(StoreKind::Event, &spec, scope(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn invalid_filter_source_is_a_validation_error() {
        let store = MockColumnStore::new();
        let engine = QueryEngine::new(Arc::new(store), QueryConfig::default());
        let mut spec = base_spec();
        spec.filter = Some("not ( valid".to_string());

        let err = engine
            .query(StoreKind::Activity, &spec, scope(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
