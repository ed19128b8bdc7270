use activity_common::AppError;
use activity_models::Scope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::rows::{ActivityRow, AuditRow, EventRow};

/// The record kind a `ColumnStore` operation is parameterized over. The
/// store sees these as opaque tables with a fixed column shape -- it has
/// no notion of the richer domain types `activity-models` defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Audit,
    Event,
    Activity,
}

impl StoreKind {
    fn table(self) -> &'static str {
        match self {
            StoreKind::Audit => "audit_records",
            StoreKind::Event => "event_records",
            StoreKind::Activity => "activities",
        }
    }
}

/// Position of the last row seen in a prior page. Pagination seeks from
/// here rather than paging with `OFFSET`, so a page is stable even as new
/// rows are appended ahead of the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    pub event_time: DateTime<Utc>,
    pub record_id: String,
}

/// The structural predicate a `query_page` call applies. Tenant scope is
/// mandatory and always becomes part of the bound `WHERE` clause -- never
/// an in-process post-filter (§4.4.1's scope-isolation invariant).
#[derive(Debug, Clone)]
pub struct StoreFilters {
    pub scope: Scope,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub namespace: Option<String>,
    pub change_source: Option<String>,
    pub resource_kind: Option<String>,
    pub resource_uid: Option<String>,
    pub api_group: Option<String>,
    pub actor_name: Option<String>,
    pub search: Option<String>,
    pub after: Option<CursorPosition>,
    /// Fetch `limit + 1` rows so the caller can detect "more pages exist"
    /// without a second round trip.
    pub limit: i64,
}

/// One row as returned by `query_page`, still tagged by kind so the query
/// engine can dispatch deserialization without a second lookup.
#[derive(Debug, Clone)]
pub enum StoreRow {
    Audit(AuditRow),
    Event(EventRow),
    Activity(ActivityRow),
}

impl StoreRow {
    pub fn event_time(&self) -> DateTime<Utc> {
        match self {
            StoreRow::Audit(row) => row.event_time,
            StoreRow::Event(row) => row.event_time,
            StoreRow::Activity(row) => row.event_time,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            StoreRow::Audit(row) => &row.id,
            StoreRow::Event(row) => &row.id,
            StoreRow::Activity(row) => &row.id,
        }
    }
}

/// The fixed operation set the query/facet engine depends on. The engine
/// treats the column store purely as a query executor -- storage engine,
/// replication and tiering are out of scope (§1) and never leak through
/// this trait. Behind the `mock` feature, `#[automock]` generates
/// `MockColumnStore` for `activity-query`'s own engine tests -- dependents
/// never pull `mockall` into a non-test build because `mock` is only
/// turned on from `[dev-dependencies]`.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ColumnStore: Send + Sync {
    async fn query_page(
        &self,
        kind: StoreKind,
        filters: &StoreFilters,
    ) -> Result<Vec<StoreRow>, AppError>;

    /// Distinct-value histogram over one allowlisted column, sorted by
    /// count descending, truncated to `limit`. `column` is never a raw
    /// caller string -- callers (the facet allowlist in `activity-query`)
    /// map requested field names to one of a fixed set of column names
    /// before this is reached.
    async fn count_facet_values(
        &self,
        kind: StoreKind,
        column: &'static str,
        scope: &Scope,
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: i64,
    ) -> Result<Vec<(String, i64)>, AppError>;
}

pub struct PgColumnStore {
    pool: PgPool,
}

impl PgColumnStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn classify_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            AppError::Corrupt(err.to_string())
        }
        _ => AppError::StorageTransient(err.to_string()),
    }
}

/// Build the dynamic `WHERE` clause for `query_page`. Every optional
/// predicate appends a placeholder *position* only -- values are bound
/// afterward in the same order this function walks them, so no
/// user-controlled fragment is ever interpolated into the SQL text.
fn build_query_page_sql(kind: StoreKind, filters: &StoreFilters) -> String {
    let mut sql = format!(
        "SELECT id, event_time, tenant_type, tenant_name, payload FROM {} \
         WHERE tenant_type = $1 AND tenant_name = $2 AND event_time >= $3 AND event_time <= $4",
        kind.table()
    );
    let mut idx = 5;
    let mut push = |clause: &str| {
        sql.push_str(&format!(" AND {} ${}", clause, idx));
        idx += 1;
    };
    if filters.namespace.is_some() {
        push("namespace =");
    }
    if filters.resource_kind.is_some() {
        push("resource_kind =");
    }
    if filters.resource_uid.is_some() {
        push("resource_uid =");
    }
    if filters.api_group.is_some() {
        push("api_group =");
    }
    if filters.actor_name.is_some() {
        push("actor_name =");
    }
    if filters.change_source.is_some() && kind == StoreKind::Activity {
        push("change_source =");
    }
    if filters.search.is_some() && kind == StoreKind::Activity {
        sql.push_str(&format!(" AND summary ILIKE ${}", idx));
        idx += 1;
    }
    if let Some(after) = &filters.after {
        sql.push_str(&format!(
            " AND (event_time, id) < (${}, ${})",
            idx,
            idx + 1
        ));
        idx += 2;
    }
    let _ = idx;
    sql.push_str(&format!(
        " ORDER BY event_time DESC, id DESC LIMIT ${}",
        idx
    ));
    sql
}

macro_rules! bind_common {
    ($query:expr, $filters:expr) => {{
        let mut q = $query
            .bind(match $filters.scope.scope_type {
                activity_models::ScopeType::Platform => "platform",
                activity_models::ScopeType::Organization => "organization",
                activity_models::ScopeType::Project => "project",
                activity_models::ScopeType::User => "user",
            })
            .bind(&$filters.scope.name)
            .bind($filters.start_time)
            .bind($filters.end_time);
        if let Some(ns) = &$filters.namespace {
            q = q.bind(ns);
        }
        if let Some(kind) = &$filters.resource_kind {
            q = q.bind(kind);
        }
        if let Some(uid) = &$filters.resource_uid {
            q = q.bind(uid);
        }
        if let Some(group) = &$filters.api_group {
            q = q.bind(group);
        }
        if let Some(actor) = &$filters.actor_name {
            q = q.bind(actor);
        }
        q
    }};
}

#[async_trait]
impl ColumnStore for PgColumnStore {
    async fn query_page(
        &self,
        kind: StoreKind,
        filters: &StoreFilters,
    ) -> Result<Vec<StoreRow>, AppError> {
        let sql = build_query_page_sql(kind, filters);

        match kind {
            StoreKind::Audit => {
                let mut q = sqlx::query_as::<_, AuditRow>(&sql);
                q = bind_common!(q, filters);
                if let Some(after) = &filters.after {
                    q = q.bind(after.event_time).bind(after.record_id.clone());
                }
                q = q.bind(filters.limit);
                let rows = q
                    .fetch_all(&self.pool)
                    .await
                    .map_err(classify_sqlx_error)?;
                Ok(rows.into_iter().map(StoreRow::Audit).collect())
            }
            StoreKind::Event => {
                let mut q = sqlx::query_as::<_, EventRow>(&sql);
                q = bind_common!(q, filters);
                if let Some(after) = &filters.after {
                    q = q.bind(after.event_time).bind(after.record_id.clone());
                }
                q = q.bind(filters.limit);
                let rows = q
                    .fetch_all(&self.pool)
                    .await
                    .map_err(classify_sqlx_error)?;
                Ok(rows.into_iter().map(StoreRow::Event).collect())
            }
            StoreKind::Activity => {
                let mut q = sqlx::query_as::<_, ActivityRow>(&sql);
                q = bind_common!(q, filters);
                if let Some(change_source) = &filters.change_source {
                    q = q.bind(change_source);
                }
                if let Some(search) = &filters.search {
                    q = q.bind(format!("%{search}%"));
                }
                if let Some(after) = &filters.after {
                    q = q.bind(after.event_time).bind(after.record_id.clone());
                }
                q = q.bind(filters.limit);
                let rows = q
                    .fetch_all(&self.pool)
                    .await
                    .map_err(classify_sqlx_error)?;

                // Newest-wins conflict resolution: keep only the
                // highest-`policy_version` row per `origin_id`, then
                // restore event-time-descending order for the page.
                //
                // Dedup runs over the `limit+1` rows already fetched, so a
                // window containing duplicate `origin_id`s can shrink below
                // `limit+1` distinct rows. The caller's has_more check
                // (`raw_rows.len() > limit`) then sees fewer rows than the
                // fetch actually spanned, so pagination can stop one page
                // early at a duplicate-heavy boundary. Scoping dedup to the
                // fetched window (rather than re-querying until `limit`
                // distinct origins are found) keeps the query a single
                // round trip; the window is never large enough for this to
                // silently drop more than a handful of distinct activities.
                let mut by_origin: std::collections::HashMap<String, ActivityRow> =
                    std::collections::HashMap::new();
                for row in rows {
                    by_origin
                        .entry(row.origin_id.clone())
                        .and_modify(|existing| {
                            if row.policy_version > existing.policy_version {
                                *existing = row.clone();
                            }
                        })
                        .or_insert(row);
                }
                let mut rows: Vec<ActivityRow> = by_origin.into_values().collect();
                rows.sort_by(|a, b| {
                    b.event_time
                        .cmp(&a.event_time)
                        .then_with(|| b.id.cmp(&a.id))
                });
                Ok(rows.into_iter().map(StoreRow::Activity).collect())
            }
        }
    }

    async fn count_facet_values(
        &self,
        kind: StoreKind,
        column: &'static str,
        scope: &Scope,
        time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: i64,
    ) -> Result<Vec<(String, i64)>, AppError> {
        let mut sql = format!(
            "SELECT {column}, COUNT(*) AS value_count FROM {} \
             WHERE tenant_type = $1 AND tenant_name = $2",
            kind.table()
        );
        if time_range.is_some() {
            sql.push_str(" AND event_time >= $3 AND event_time <= $4");
        }
        sql.push_str(&format!(
            " GROUP BY {column} ORDER BY value_count DESC LIMIT ${}",
            if time_range.is_some() { 5 } else { 3 }
        ));

        let tenant_type = match scope.scope_type {
            activity_models::ScopeType::Platform => "platform",
            activity_models::ScopeType::Organization => "organization",
            activity_models::ScopeType::Project => "project",
            activity_models::ScopeType::User => "user",
        };
        let mut q = sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(tenant_type)
            .bind(&scope.name);
        if let Some((start, end)) = time_range {
            q = q.bind(start).bind(end);
        }
        q = q.bind(limit);

        q.fetch_all(&self.pool).await.map_err(classify_sqlx_error)
    }
}
