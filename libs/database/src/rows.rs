use activity_common::AppError;
use activity_models::{Activity, AuditRecord, EventRecord, Scope, ScopeType};
use chrono::{DateTime, Utc};

fn scope_type_from_column(value: &str) -> Result<ScopeType, AppError> {
    match value {
        "platform" => Ok(ScopeType::Platform),
        "organization" => Ok(ScopeType::Organization),
        "project" => Ok(ScopeType::Project),
        "user" => Ok(ScopeType::User),
        other => Err(AppError::Corrupt(format!(
            "unrecognized tenant_type column value {other:?}"
        ))),
    }
}

fn corrupt<T>(context: &str) -> impl FnOnce(serde_json::Error) -> AppError + '_ {
    move |err| AppError::Corrupt(format!("{context}: {err}"))
}

/// One `audit_records` row. `payload` carries the full record as the
/// translator and query engine see it; the remaining columns are the
/// ones the store needs to filter and paginate on without deserializing
/// every row's payload first.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    pub id: String,
    pub event_time: DateTime<Utc>,
    pub tenant_type: String,
    pub tenant_name: String,
    pub payload: serde_json::Value,
}

impl AuditRow {
    pub fn tenant(&self) -> Result<Scope, AppError> {
        Ok(Scope::new(
            scope_type_from_column(&self.tenant_type)?,
            self.tenant_name.clone(),
        ))
    }

    pub fn into_record(self) -> Result<AuditRecord, AppError> {
        serde_json::from_value(self.payload).map_err(corrupt("audit record payload"))
    }
}

/// One `event_records` row; same column shape as [`AuditRow`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: String,
    pub event_time: DateTime<Utc>,
    pub tenant_type: String,
    pub tenant_name: String,
    pub payload: serde_json::Value,
}

impl EventRow {
    pub fn tenant(&self) -> Result<Scope, AppError> {
        Ok(Scope::new(
            scope_type_from_column(&self.tenant_type)?,
            self.tenant_name.clone(),
        ))
    }

    pub fn into_record(self) -> Result<EventRecord, AppError> {
        serde_json::from_value(self.payload).map_err(corrupt("event record payload"))
    }
}

/// One `activities` row. `origin_id` and `policy_version` are broken out
/// as columns (rather than left inside `payload`) because newest-wins
/// conflict resolution groups on them directly in SQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: String,
    pub event_time: DateTime<Utc>,
    pub tenant_type: String,
    pub tenant_name: String,
    pub origin_id: String,
    pub policy_version: String,
    pub payload: serde_json::Value,
}

impl ActivityRow {
    pub fn tenant(&self) -> Result<Scope, AppError> {
        Ok(Scope::new(
            scope_type_from_column(&self.tenant_type)?,
            self.tenant_name.clone(),
        ))
    }

    pub fn into_activity(self) -> Result<Activity, AppError> {
        // `Activity` itself embeds policy-version only in its metadata
        // labels; deserialize it as written on the wire rather than
        // re-deriving from the broken-out columns.
        let activity: Activity =
            serde_json::from_value(self.payload).map_err(corrupt("activity payload"))?;
        Ok(activity)
    }
}
