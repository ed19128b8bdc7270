use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// One translation rule: a boolean `match` predicate and a templated
/// `summary`, both in the expression language. Source text only — the
/// policy cache owns compilation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RuleSource {
    #[serde(rename = "match")]
    #[validate(length(min = 1, message = "match expression must not be empty"))]
    pub match_expr: String,
    #[validate(length(min = 1, message = "summary template must not be empty"))]
    pub summary: String,
}

/// An `ActivityPolicy` persistent resource: translation rules for one
/// target `(apiGroup, kind)`. `(apiGroup, kind)` is unique across
/// policies — duplicates are rejected at admission time.
///
/// `Validate` only checks the structural admission rules below (name
/// shape, non-empty rule source text); whether a rule actually *compiles*
/// is a separate, later concern owned by `activity-policy-cache`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ActivityPolicy {
    #[validate(length(
        min = 1,
        max = 253,
        message = "name must be between 1 and 253 characters"
    ))]
    pub name: String,
    /// Empty string is the core Kubernetes API group (e.g. `Pod`,
    /// `ConfigMap`) and is a legitimate target, so this is intentionally
    /// unconstrained -- only `kind` and `name` are required non-empty.
    pub api_group: String,
    #[validate(length(min = 1, message = "kind must not be empty"))]
    pub kind: String,
    #[serde(default)]
    #[validate]
    pub audit_rules: Vec<RuleSource>,
    #[serde(default)]
    #[validate]
    pub event_rules: Vec<RuleSource>,
    /// Arbitrary operator-assigned labels, matched by re-index's
    /// `matchLabels` policy selector (all listed labels must be present
    /// with equal values).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ActivityPolicy {
    pub fn target(&self) -> (String, String) {
        (self.api_group.clone(), self.kind.clone())
    }

    pub fn matches_labels(&self, match_labels: &BTreeMap<String, String>) -> bool {
        match_labels
            .iter()
            .all(|(k, v)| self.labels.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_labels_requires_every_selector_label_present_and_equal() {
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "platform".to_string());
        labels.insert("tier".to_string(), "core".to_string());
        let policy = ActivityPolicy {
            name: "p".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![],
            event_rules: vec![],
            labels,
        };

        let mut selector = BTreeMap::new();
        selector.insert("team".to_string(), "platform".to_string());
        assert!(policy.matches_labels(&selector));

        selector.insert("tier".to_string(), "edge".to_string());
        assert!(!policy.matches_labels(&selector));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let policy = ActivityPolicy {
            name: "p".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![],
            event_rules: vec![],
            labels: BTreeMap::new(),
        };
        assert!(policy.matches_labels(&BTreeMap::new()));
    }

    #[test]
    fn empty_api_group_is_valid_for_core_resources() {
        let policy = ActivityPolicy {
            name: "pods".to_string(),
            api_group: String::new(),
            kind: "Pod".to_string(),
            audit_rules: vec![],
            event_rules: vec![],
            labels: BTreeMap::new(),
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn rejects_empty_name_and_kind() {
        let policy = ActivityPolicy {
            name: String::new(),
            api_group: "apps".to_string(),
            kind: String::new(),
            audit_rules: vec![],
            event_rules: vec![],
            labels: BTreeMap::new(),
        };
        let errors = policy.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("kind"));
    }

    #[test]
    fn rejects_a_rule_with_an_empty_match_expression() {
        let policy = ActivityPolicy {
            name: "deployments".to_string(),
            api_group: "apps".to_string(),
            kind: "Deployment".to_string(),
            audit_rules: vec![RuleSource {
                match_expr: String::new(),
                summary: "created".to_string(),
            }],
            event_rules: vec![],
            labels: BTreeMap::new(),
        };
        assert!(policy.validate().is_err());
    }
}
