use activity_models::{ActorType, AuditUser};
use regex::Regex;

/// Patterns used to classify an actor's identity string into
/// `user`/`machine-account`/`controller`. Configured rather than
/// hard-coded so operators can adapt to their cluster's service-account
/// and controller naming conventions.
#[derive(Debug, Clone)]
pub struct ActorClassifierConfig {
    service_account_pattern: Regex,
    controller_patterns: Vec<Regex>,
}

impl ActorClassifierConfig {
    pub fn new(service_account_pattern: &str, controller_patterns: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            service_account_pattern: Regex::new(service_account_pattern)?,
            controller_patterns: controller_patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<_, _>>()?,
        })
    }

    fn classify_identity(&self, identity: &str) -> ActorType {
        if self.controller_patterns.iter().any(|p| p.is_match(identity)) {
            ActorType::Controller
        } else if self.service_account_pattern.is_match(identity) {
            ActorType::MachineAccount
        } else {
            ActorType::User
        }
    }

    /// Classify an audit record's actor from its `user` stanza.
    pub fn classify_audit_user(&self, user: &AuditUser) -> ActorType {
        self.classify_identity(&user.username)
    }

    /// Classify an event's actor from its reporting controller, since
    /// events carry no `user` stanza -- they originate from a
    /// controller's own report of what it observed.
    pub fn classify_reporting_controller(&self, reporting_controller: &str) -> ActorType {
        match self.classify_identity(reporting_controller) {
            ActorType::User => ActorType::Controller,
            other => other,
        }
    }
}

impl Default for ActorClassifierConfig {
    /// Kubernetes-standard service-account identity form
    /// (`system:serviceaccount:<namespace>:<name>`) and the common
    /// `*-controller`/`*-controller-manager` naming convention.
    fn default() -> Self {
        Self::new(
            r"^system:serviceaccount:",
            &[r"-controller(-manager)?$", r"^system:"],
        )
        .expect("default classifier patterns are valid regexes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_form_is_machine_account() {
        let config = ActorClassifierConfig::default();
        let user = AuditUser {
            username: "system:serviceaccount:default:deployer".to_string(),
            groups: vec![],
            uid: None,
        };
        assert_eq!(config.classify_audit_user(&user), ActorType::MachineAccount);
    }

    #[test]
    fn plain_email_is_user() {
        let config = ActorClassifierConfig::default();
        let user = AuditUser {
            username: "alice@example.com".to_string(),
            groups: vec![],
            uid: None,
        };
        assert_eq!(config.classify_audit_user(&user), ActorType::User);
    }

    #[test]
    fn controller_suffix_is_controller() {
        let config = ActorClassifierConfig::default();
        assert_eq!(
            config.classify_reporting_controller("workload-controller"),
            ActorType::Controller
        );
    }
}
