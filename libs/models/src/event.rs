use crate::resource::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum EventType {
    Normal,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub uid: Uuid,
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventSeries {
    pub count: u32,
    pub last_observed_time: DateTime<Utc>,
}

/// A Kubernetes Event, as consumed by the translator and the column
/// store. Identity is `(uid, resourceVersion)` for updates, `uid`
/// otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub metadata: EventMetadata,
    pub reason: String,
    pub note: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub regarding: Option<ObjectRef>,
    pub related: Option<ObjectRef>,
    pub reporting_controller: String,
    pub reporting_instance: String,
    pub event_time: DateTime<Utc>,
    pub series: Option<EventSeries>,
    pub action: Option<String>,
}

impl EventRecord {
    /// Dedup identity: `uid` for adds, `uid-resourceVersion` for updates.
    pub fn origin_id(&self) -> String {
        match &self.metadata.resource_version {
            Some(rv) if self.is_update() => format!("{}-{}", self.metadata.uid, rv),
            _ => self.metadata.uid.to_string(),
        }
    }

    fn is_update(&self) -> bool {
        self.series.as_ref().map(|s| s.count > 1).unwrap_or(false)
    }

    pub fn target_identity(&self) -> Option<(String, String)> {
        let regarding = self.regarding.as_ref()?;
        let kind = regarding.kind.clone()?;
        Some((regarding.api_group.clone().unwrap_or_default(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event() -> EventRecord {
        EventRecord {
            metadata: EventMetadata {
                uid: Uuid::nil(),
                namespace: Some("default".to_string()),
                name: "api-server.17f".to_string(),
                resource_version: Some("42".to_string()),
                annotations: HashMap::new(),
            },
            reason: "Ready".to_string(),
            note: None,
            event_type: EventType::Normal,
            regarding: None,
            related: None,
            reporting_controller: "workload-controller".to_string(),
            reporting_instance: "workload-controller-0".to_string(),
            event_time: Utc::now(),
            series: None,
            action: None,
        }
    }

    #[test]
    fn add_uses_bare_uid() {
        let event = base_event();
        assert_eq!(event.origin_id(), Uuid::nil().to_string());
    }

    #[test]
    fn update_uses_uid_and_resource_version() {
        let mut event = base_event();
        event.series = Some(EventSeries {
            count: 3,
            last_observed_time: Utc::now(),
        });
        assert_eq!(
            event.origin_id(),
            format!("{}-42", Uuid::nil())
        );
    }
}
