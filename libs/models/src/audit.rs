use crate::resource::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditUser {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseStatus {
    pub code: u16,
}

/// A Kubernetes audit event, as consumed by the translator and the column
/// store. Identity is `audit_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub verb: String,
    pub stage: String,
    pub level: String,
    pub user: AuditUser,
    pub object_ref: Option<ObjectRef>,
    pub response_status: Option<ResponseStatus>,
    pub request_received_timestamp: DateTime<Utc>,
    pub stage_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub request_object: Option<serde_json::Value>,
    pub response_object: Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn origin_id(&self) -> String {
        self.audit_id.to_string()
    }

    /// `(apiGroup, kind)` target identity used by the policy cache lookup.
    pub fn target_identity(&self) -> Option<(String, String)> {
        let object_ref = self.object_ref.as_ref()?;
        let kind = object_ref.kind.clone()?;
        Some((object_ref.api_group.clone().unwrap_or_default(), kind))
    }
}
