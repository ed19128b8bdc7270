use crate::resource::ResourceRef;
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const API_VERSION: &str = "activity.datumapis.com/v1alpha1";
pub const KIND: &str = "Activity";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Human,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ActorType {
    User,
    MachineAccount,
    Controller,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub name: String,
    pub uid: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    Audit,
    Event,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Origin {
    #[serde(rename = "type")]
    pub origin_type: OriginType,
    pub id: String,
}

/// A substring of `summary` bound to a resource reference, rendered as a
/// UI link. `marker` is verified to be a contiguous substring of the
/// Activity's summary before the Activity is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLink {
    pub marker: String,
    pub resource: ResourceRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetadata {
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Uuid,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySpec {
    pub summary: String,
    pub change_source: ChangeSource,
    pub actor: Actor,
    pub resource: ResourceRef,
    #[serde(default)]
    pub links: Vec<ActivityLink>,
    pub tenant: Scope,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    pub origin: Origin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub api_version: String,
    pub kind: String,
    pub metadata: ActivityMetadata,
    pub spec: ActivitySpec,
}

impl Activity {
    pub fn new(metadata: ActivityMetadata, spec: ActivitySpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata,
            spec,
        }
    }

    /// Bus-level dedup key: `origin.type|origin.id|policy-version`.
    pub fn dedup_key(&self, policy_version: &str) -> String {
        let origin_type = match self.spec.origin.origin_type {
            OriginType::Audit => "audit",
            OriginType::Event => "event",
        };
        format!("{}|{}|{}", origin_type, self.spec.origin.id, policy_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_activity() -> Activity {
        Activity::new(
            ActivityMetadata {
                name: "api-gateway-create".to_string(),
                namespace: Some("default".to_string()),
                uid: Uuid::nil(),
                creation_timestamp: Utc::now(),
                labels: BTreeMap::new(),
            },
            ActivitySpec {
                summary: "alice@example.com created api-gateway".to_string(),
                change_source: ChangeSource::Human,
                actor: Actor {
                    actor_type: ActorType::User,
                    name: "alice@example.com".to_string(),
                    uid: None,
                    email: Some("alice@example.com".to_string()),
                },
                resource: ResourceRef::new("Deployment", "api-gateway"),
                links: vec![],
                tenant: Scope::new(crate::scope::ScopeType::Organization, "acme"),
                changes: vec![],
                origin: Origin {
                    origin_type: OriginType::Audit,
                    id: "abc-123".to_string(),
                },
            },
        )
    }

    #[test]
    fn dedup_key_combines_origin_and_policy_version() {
        let activity = sample_activity();
        assert_eq!(activity.dedup_key("v1"), "audit|abc-123|v1");
    }

    #[test]
    fn actor_type_serializes_kebab_case() {
        let json = serde_json::to_value(ActorType::MachineAccount).unwrap();
        assert_eq!(json, serde_json::json!("machine-account"));
    }
}
