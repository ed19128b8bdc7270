use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use activity_models::ActivityPolicy;
use activity_policy_cache::PolicyCache;
use sqlx::PgPool;

/// Mirrors `translator-worker`'s policy sync: this service also needs a
/// populated cache to resolve `policy_names`/`match_labels` selectors and
/// to drive translation during a run, and has no subscription channel to
/// the policy store any more than the worker does.
pub async fn run(pool: PgPool, cache: Arc<PolicyCache>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(error) = sync_once(&pool, &cache).await {
            tracing::warn!(%error, "policy sync pass failed, will retry on next tick");
        }
    }
}

pub async fn sync_once_blocking(pool: &PgPool, cache: &PolicyCache) {
    if let Err(error) = sync_once(pool, cache).await {
        tracing::warn!(%error, "initial policy sync failed, starting with an empty cache");
    }
}

async fn sync_once(pool: &PgPool, cache: &PolicyCache) -> Result<(), sqlx::Error> {
    let rows: Vec<PolicyRow> = sqlx::query_as(
        "SELECT name, api_group, kind, audit_rules, event_rules, labels FROM activity_policies",
    )
    .fetch_all(pool)
    .await?;

    let served: HashSet<String> = rows.iter().map(|r| r.name.clone()).collect();
    for row in rows {
        if let Some(policy) = row.into_policy() {
            cache.upsert(&policy);
        }
    }

    for existing in cache.list_policies() {
        if !served.contains(&existing.name) {
            cache.delete(&existing.name);
        }
    }

    Ok(())
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
    fn into_policy(self) -> Option<ActivityPolicy> {
        Some(ActivityPolicy {
            name: self.name,
            api_group: self.api_group,
            kind: self.kind,
            audit_rules: serde_json::from_value(self.audit_rules).ok()?,
            event_rules: serde_json::from_value(self.event_rules).ok()?,
            labels: serde_json::from_value(self.labels).ok()?,
        })
    }
}
