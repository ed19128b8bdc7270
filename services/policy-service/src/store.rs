use activity_common::AppError;
use activity_models::ActivityPolicy;
use sqlx::PgPool;

/// Persists `ActivityPolicy` resources so the cache can be rebuilt on
/// restart without replaying every historical admission call. The cache
/// itself is the source of truth for what is currently *served*; this
/// table is the source of truth for what was last *admitted*, including
/// entries that failed to compile and are retained for operator review.
pub struct PolicyStore {
    pool: PgPool,
}

impl PolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, policy: &ActivityPolicy) -> Result<(), AppError> {
        let audit_rules = serde_json::to_value(&policy.audit_rules)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let event_rules = serde_json::to_value(&policy.event_rules)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let labels =
            serde_json::to_value(&policy.labels).map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO activity_policies (name, api_group, kind, audit_rules, event_rules, labels, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (name) DO UPDATE SET \
               api_group = EXCLUDED.api_group, kind = EXCLUDED.kind, \
               audit_rules = EXCLUDED.audit_rules, event_rules = EXCLUDED.event_rules, \
               labels = EXCLUDED.labels, updated_at = now()",
        )
        .bind(&policy.name)
        .bind(&policy.api_group)
        .bind(&policy.kind)
        .bind(audit_rules)
        .bind(event_rules)
        .bind(labels)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM activity_policies WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ActivityPolicy>, AppError> {
        let rows = sqlx::query_as::<_, PolicyRow>(
            "SELECT name, api_group, kind, audit_rules, event_rules, labels FROM activity_policies",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(PolicyRow::into_policy).collect()
    }
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    name: String,
    api_group: String,
    kind: String,
    audit_rules: serde_json::Value,
    event_rules: serde_json::Value,
    labels: serde_json::Value,
}

impl PolicyRow {
    fn into_policy(self) -> Result<ActivityPolicy, AppError> {
        Ok(ActivityPolicy {
            name: self.name,
            api_group: self.api_group,
            kind: self.kind,
            audit_rules: serde_json::from_value(self.audit_rules)
                .map_err(|e| AppError::Corrupt(e.to_string()))?,
            event_rules: serde_json::from_value(self.event_rules)
                .map_err(|e| AppError::Corrupt(e.to_string()))?,
            labels: serde_json::from_value(self.labels)
                .map_err(|e| AppError::Corrupt(e.to_string()))?,
        })
    }
}
