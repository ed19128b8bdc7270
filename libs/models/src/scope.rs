use serde::{Deserialize, Serialize};

/// Tenant scope under which a record or Activity is visible.
///
/// Scopes are **not** hierarchically inclusive: a query at `Organization`
/// sees only records tagged with that organization, never descendants or
/// ancestors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Platform,
    Organization,
    Project,
    User,
}

impl Scope {
    pub fn new(scope_type: ScopeType, name: impl Into<String>) -> Self {
        Self {
            scope_type,
            name: name.into(),
        }
    }

    /// Parse the `scope.type` / `scope.name` ingest annotations that are
    /// authoritative for tenancy. Returns `None` if either is missing or
    /// `scope.type` does not match a known variant.
    pub fn from_annotations(
        scope_type: Option<&str>,
        scope_name: Option<&str>,
    ) -> Option<Self> {
        let scope_type = match scope_type? {
            "platform" => ScopeType::Platform,
            "organization" => ScopeType::Organization,
            "project" => ScopeType::Project,
            "user" => ScopeType::User,
            _ => return None,
        };
        let name = scope_name?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(scope_type, name))
    }
}
