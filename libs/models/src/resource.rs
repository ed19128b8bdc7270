use serde::{Deserialize, Serialize};

/// Identifier-only reference to a Kubernetes resource.
///
/// Tree-shaped by construction: a `ResourceRef` never back-references an
/// Activity, so Activity <-> ResourceRef can never form a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub api_group: Option<String>,
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Option<String>,
}

impl ResourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_group: None,
            api_version: None,
            kind: kind.into(),
            name: name.into(),
            namespace: None,
            uid: None,
        }
    }
}

/// `objectRef` as carried by an audit record. Distinct from `ResourceRef`
/// because it additionally names the REST `resource`/`subresource`, which
/// an Activity's resolved `resource` link does not need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub api_group: Option<String>,
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub resource: Option<String>,
    pub subresource: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub uid: Option<String>,
}

impl ObjectRef {
    pub fn to_resource_ref(&self) -> Option<ResourceRef> {
        Some(ResourceRef {
            api_group: self.api_group.clone(),
            api_version: self.api_version.clone(),
            kind: self.kind.clone()?,
            name: self.name.clone()?,
            namespace: self.namespace.clone(),
            uid: self.uid.clone(),
        })
    }
}
