use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use activity_common::AppError;
use activity_expr::{evaluate_template, Env};
use activity_models::{
    Activity, ActivityLink, ActivityMetadata, ActivitySpec, Actor, ActorType, ChangeSource,
    Ingested, Origin, OriginType, Record, RecordKind,
};
use activity_policy_cache::{MatchOutcome, PolicyCache};

use crate::actor::ActorClassifierConfig;
use crate::field_changes::diff_top_level;
use crate::metrics::METRICS;

/// Builds at most one [`Activity`] from a source record plus its
/// ingest-time tenant, per the algorithm in §4.3. Holds only a shared
/// handle to the policy cache and the actor classifier config -- no
/// mutable state of its own beyond the process-wide counters in
/// [`crate::metrics`].
pub struct Translator {
    cache: Arc<PolicyCache>,
    classifier: ActorClassifierConfig,
}

impl Translator {
    pub fn new(cache: Arc<PolicyCache>, classifier: ActorClassifierConfig) -> Self {
        Self { cache, classifier }
    }

    /// `Ok(None)` means "no rule matched, not an error". `Err` means the
    /// record resolved to a rule but rendering the Activity failed
    /// (non-fatal evaluation failure, counted and dropped by the caller).
    pub fn translate(&self, ingested: &Ingested<Record>) -> Result<Option<Activity>, AppError> {
        let Some(target) = ingested.record.target_identity() else {
            METRICS.record_skipped_no_match();
            return Ok(None);
        };

        let built = match &ingested.record {
            Record::Audit(audit) => {
                let actor_type = self.classifier.classify_audit_user(&audit.user);
                let actor_name = audit.user.username.clone();
                let env = Env::new()
                    .bind(
                        "audit",
                        serde_json::to_value(audit)
                            .map_err(|e| AppError::Evaluation(e.to_string()))?,
                    )
                    .bind("actor", json!(actor_name))
                    .bind("kind", json!(target.1));
                let resource = audit
                    .object_ref
                    .as_ref()
                    .and_then(|o| o.to_resource_ref())
                    .ok_or_else(|| {
                        AppError::Evaluation("objectRef is missing kind or name".to_string())
                    })?;
                let origin = Origin {
                    origin_type: OriginType::Audit,
                    id: audit.origin_id(),
                };
                let actor = Actor {
                    actor_type,
                    name: actor_name,
                    uid: audit.user.uid.clone(),
                    email: None,
                };
                Built {
                    record_kind: RecordKind::Audit,
                    env,
                    actor,
                    resource,
                    origin,
                }
            }
            Record::Event(event) => {
                let actor_type = self
                    .classifier
                    .classify_reporting_controller(&event.reporting_controller);
                let actor_name = event.reporting_controller.clone();
                let env = Env::new()
                    .bind(
                        "event",
                        serde_json::to_value(event)
                            .map_err(|e| AppError::Evaluation(e.to_string()))?,
                    )
                    .bind("actor", json!(actor_name))
                    .bind("kind", json!(target.1));
                let resource = event
                    .regarding
                    .as_ref()
                    .and_then(|o| o.to_resource_ref())
                    .ok_or_else(|| {
                        AppError::Evaluation("regarding is missing kind or name".to_string())
                    })?;
                let origin = Origin {
                    origin_type: OriginType::Event,
                    id: event.origin_id(),
                };
                let actor = Actor {
                    actor_type,
                    name: actor_name,
                    uid: None,
                    email: None,
                };
                Built {
                    record_kind: RecordKind::Event,
                    env,
                    actor,
                    resource,
                    origin,
                }
            }
        };

        let outcome = self.cache.match_record(built.record_kind, &target, &built.env);
        let (policy_name, policy_version, summary_program) = match outcome {
            MatchOutcome::NoMatch => {
                METRICS.record_skipped_no_match();
                return Ok(None);
            }
            MatchOutcome::Matched {
                policy_name,
                policy_version,
                summary_program,
            } => (policy_name, policy_version, summary_program),
        };

        let summary = evaluate_template(&summary_program, &built.env).map_err(|e| {
            METRICS.record_translation_failure();
            AppError::Evaluation(e.to_string())
        })?;

        let mut links = Vec::new();
        for link in built.env.links() {
            if summary.contains(&link.marker) {
                links.push(ActivityLink {
                    marker: link.marker,
                    resource: link.resource,
                });
            } else {
                METRICS.record_link_marker_mismatch();
                tracing::warn!(
                    marker = %link.marker,
                    "link marker does not occur in rendered summary, dropping"
                );
            }
        }

        let changes = match &ingested.record {
            Record::Audit(audit) => match (&audit.request_object, &audit.response_object) {
                (Some(request), Some(response)) => diff_top_level(request, response),
                _ => Vec::new(),
            },
            Record::Event(_) => Vec::new(),
        };

        let change_source = classify_change_source(&built.actor, &ingested.record);

        let mut labels = BTreeMap::new();
        labels.insert("policy-name".to_string(), policy_name);
        labels.insert("policy-version".to_string(), policy_version);

        let metadata = ActivityMetadata {
            name: format!("{}-{}", target.1.to_lowercase(), Uuid::new_v4()),
            namespace: built.resource.namespace.clone(),
            uid: Uuid::new_v4(),
            creation_timestamp: Utc::now(),
            labels,
        };
        let spec = ActivitySpec {
            summary,
            change_source,
            actor: built.actor,
            resource: built.resource,
            links,
            tenant: ingested.tenant.clone(),
            changes,
            origin: built.origin,
        };

        METRICS.record_matched();
        Ok(Some(Activity::new(metadata, spec)))
    }
}

struct Built {
    record_kind: RecordKind,
    env: Env,
    actor: Actor,
    resource: activity_models::ResourceRef,
    origin: Origin,
}

/// `human` iff the actor is a user, or a machine account explicitly
/// flagged as user-initiated via the `initiated-by: user` source
/// annotation; otherwise `system`.
fn classify_change_source(actor: &Actor, record: &Record) -> ChangeSource {
    match actor.actor_type {
        ActorType::User => ChangeSource::Human,
        ActorType::MachineAccount => {
            let initiated_by_user = match record {
                Record::Audit(audit) => {
                    audit.annotations.get("initiated-by").map(String::as_str) == Some("user")
                }
                Record::Event(event) => {
                    event
                        .metadata
                        .annotations
                        .get("initiated-by")
                        .map(String::as_str)
                        == Some("user")
                }
            };
            if initiated_by_user {
                ChangeSource::Human
            } else {
                ChangeSource::System
            }
        }
        ActorType::Controller => ChangeSource::System,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_models::{
        ActivityPolicy, AuditRecord, AuditUser, ObjectRef, ResponseStatus, RuleSource, Scope,
        ScopeType,
    };
    use std::collections::HashMap;

    fn translator_with_policy(policy: &ActivityPolicy) -> Translator {
        let cache = Arc::new(PolicyCache::new());
        cache.upsert(policy);
        Translator::new(cache, ActorClassifierConfig::default())
    }

    fn audit_create() -> AuditRecord {
        AuditRecord {
            audit_id: Uuid::nil(),
            verb: "create".to_string(),
            stage: "ResponseComplete".to_string(),
            level: "RequestResponse".to_string(),
            user: AuditUser {
                username: "alice@example.com".to_string(),
                groups: vec![],
                uid: None,
            },
            object_ref: Some(ObjectRef {
                api_group: Some("apps".to_string()),
                api_version: Some("apps/v1".to_string()),
                kind: Some("Deployment".to_string()),
                resource: Some("deployments".to_string()),
                subresource: None,
                namespace: Some("default".to_string()),
                name: Some("api-gateway".to_string()),
                uid: Some("uid-1".to_string()),
            }),
            response_status: Some(ResponseStatus { code: 201 }),
            request_received_timestamp: Utc::now(),
            stage_timestamp: Utc::now(),
            annotations: HashMap::new(),
            request_object: None,
            response_object: Some(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "api-gateway", "namespace": "default"}
            })),
        }
    }

    // Scenario 1 from the acceptance checklist: audit create translates
    // with a link, human change source, audit origin.
    #[test]
    fn audit_create_translates_with_link() {
        let policy = ActivityPolicy {
            name: "deployments".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![RuleSource {
                match_expr: r#"audit.verb == "create""#.to_string(),
                summary: "{{ actor }} created {{ link(audit.objectRef.name, audit.responseObject) }}"
                    .to_string(),
            }],
            event_rules: vec![],
            labels: std::collections::BTreeMap::new(),
        };
        let translator = translator_with_policy(&policy);
        let ingested = Ingested::new(
            Record::Audit(audit_create()),
            Scope::new(ScopeType::Organization, "acme"),
        );

        let activity = translator.translate(&ingested).unwrap().unwrap();
        assert_eq!(activity.spec.summary, "alice@example.com created api-gateway");
        assert_eq!(activity.spec.links.len(), 1);
        assert_eq!(activity.spec.links[0].marker, "api-gateway");
        assert_eq!(activity.spec.change_source, ChangeSource::Human);
        assert_eq!(activity.spec.actor.actor_type, ActorType::User);
        assert_eq!(activity.spec.origin.origin_type, OriginType::Audit);
    }

    #[test]
    fn no_matching_rule_returns_none() {
        let policy = ActivityPolicy {
            name: "deployments".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![RuleSource {
                match_expr: r#"audit.verb == "delete""#.to_string(),
                summary: "deleted".to_string(),
            }],
            event_rules: vec![],
            labels: std::collections::BTreeMap::new(),
        };
        let translator = translator_with_policy(&policy);
        let ingested = Ingested::new(
            Record::Audit(audit_create()),
            Scope::new(ScopeType::Organization, "acme"),
        );
        assert!(translator.translate(&ingested).unwrap().is_none());
    }

    #[test]
    fn mismatched_link_marker_is_dropped_not_fatal() {
        let policy = ActivityPolicy {
            name: "deployments".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![RuleSource {
                match_expr: r#"audit.verb == "create""#.to_string(),
                summary: "{{ link(\"totally-different-name\", audit.responseObject) }} created"
                    .to_string(),
            }],
            event_rules: vec![],
            labels: std::collections::BTreeMap::new(),
        };
        let translator = translator_with_policy(&policy);
        let ingested = Ingested::new(
            Record::Audit(audit_create()),
            Scope::new(ScopeType::Organization, "acme"),
        );
        let activity = translator.translate(&ingested).unwrap().unwrap();
        assert!(activity.spec.links.is_empty());
    }
}
