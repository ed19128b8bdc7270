use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use activity_expr::{evaluate_predicate, Env, Program};
use activity_models::{ActivityPolicy, RecordKind};
use arc_swap::ArcSwap;

use crate::compile::{compile_policy, CompiledPolicy};
use crate::status::PolicyStatus;

type Target = (String, String);

/// An immutable, point-in-time view of every `Ready` policy, indexed by
/// its target `(apiGroup, kind)`. Readers take an `Arc` handle to one of
/// these and never block; writers build a new `Snapshot` and swap the
/// pointer.
struct Snapshot {
    by_target: HashMap<Target, Arc<CompiledPolicy>>,
    /// Raw policy source by name, kept alongside the compiled view so
    /// callers that need the whole policy (re-index's selector, admission
    /// listing) don't have to reconstruct it from compiled programs.
    by_name: HashMap<String, ActivityPolicy>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            by_target: HashMap::new(),
            by_name: HashMap::new(),
        }
    }
}

/// Outcome of matching one record against the policy targeting its
/// `(apiGroup, kind)`.
pub enum MatchOutcome {
    Matched {
        policy_name: String,
        policy_version: String,
        summary_program: Program,
    },
    NoMatch,
}

/// Holds compiled rule programs indexed by target, recompiling on
/// `upsert`/`delete` and matching a record to at most one rule on the hot
/// path. See §4.2: `Match` is wait-free; `Upsert`/`Delete` serialize
/// amongst themselves under `writer_lock`.
pub struct PolicyCache {
    snapshot: ArcSwap<Snapshot>,
    writer_lock: Mutex<()>,
    statuses: Mutex<HashMap<String, PolicyStatus>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            writer_lock: Mutex::new(()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn status_of(&self, policy_name: &str) -> Option<PolicyStatus> {
        self.statuses.lock().unwrap().get(policy_name).cloned()
    }

    /// Compile every rule in `policy`. If every rule compiles and no
    /// *other* policy already owns this `(apiGroup, kind)` target, swap
    /// in the new entry atomically and mark `Ready`. Otherwise retain
    /// whatever was previously served for this policy's target and mark
    /// `NotReady` -- the served program never regresses.
    pub fn upsert(&self, policy: &ActivityPolicy) -> PolicyStatus {
        let _guard = self.writer_lock.lock().unwrap();
        let target = policy.target();

        let current = self.snapshot.load();
        if let Some(existing) = current.by_target.get(&target) {
            if existing.policy_name != policy.name {
                let status = PolicyStatus::NotReady {
                    causes: vec![crate::status::CompileCause {
                        list: crate::status::RuleList::Audit,
                        rule_index: 0,
                        detail: format!(
                            "target ({}, {}) is already owned by policy {:?}",
                            target.0, target.1, existing.policy_name
                        ),
                    }],
                };
                self.statuses
                    .lock()
                    .unwrap()
                    .insert(policy.name.clone(), status.clone());
                return status;
            }
        }

        let status = match compile_policy(policy) {
            Ok(compiled) => {
                let mut by_target: HashMap<Target, Arc<CompiledPolicy>> = current
                    .by_target
                    .iter()
                    .filter(|(t, entry)| **t == target || entry.policy_name != policy.name)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                by_target.insert(target, Arc::new(compiled.clone()));
                let mut by_name = current.by_name.clone();
                by_name.insert(policy.name.clone(), policy.clone());
                self.snapshot
                    .store(Arc::new(Snapshot { by_target, by_name }));
                PolicyStatus::Ready {
                    policy_version: compiled.policy_version,
                }
            }
            Err(causes) => PolicyStatus::NotReady { causes },
        };
        self.statuses
            .lock()
            .unwrap()
            .insert(policy.name.clone(), status.clone());
        status
    }

    /// Remove every target entry owned by `policy_name`. Atomic: readers
    /// never observe a partially-removed snapshot.
    pub fn delete(&self, policy_name: &str) {
        let _guard = self.writer_lock.lock().unwrap();
        let current = self.snapshot.load();
        let by_target: HashMap<Target, Arc<CompiledPolicy>> = current
            .by_target
            .iter()
            .filter(|(_, entry)| entry.policy_name != policy_name)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut by_name = current.by_name.clone();
        by_name.remove(policy_name);
        self.snapshot
            .store(Arc::new(Snapshot { by_target, by_name }));
        self.statuses.lock().unwrap().remove(policy_name);
    }

    /// Every currently-served policy, in no particular order. Used by
    /// callers (re-index's policy selector) that need the raw policy
    /// definition -- including labels -- rather than a compiled view.
    pub fn list_policies(&self) -> Vec<ActivityPolicy> {
        self.snapshot.load().by_name.values().cloned().collect()
    }

    /// Match `env` against the first rule (preserving list order) in the
    /// entry targeting `target`, for the given record kind. A rule whose
    /// predicate errors during evaluation is skipped, not treated as a
    /// cache-wide failure -- the next rule is tried.
    pub fn match_record(
        &self,
        record_kind: RecordKind,
        target: &Target,
        env: &Env,
    ) -> MatchOutcome {
        let snapshot = self.snapshot.load();
        let Some(entry) = snapshot.by_target.get(target) else {
            return MatchOutcome::NoMatch;
        };
        let rules = match record_kind {
            RecordKind::Audit => &entry.audit_rules,
            RecordKind::Event => &entry.event_rules,
        };
        for rule in rules {
            match evaluate_predicate(&rule.match_program, env) {
                Ok(true) => {
                    return MatchOutcome::Matched {
                        policy_name: entry.policy_name.clone(),
                        policy_version: entry.policy_version.clone(),
                        summary_program: rule.summary_program.clone(),
                    }
                }
                Ok(false) => continue,
                Err(error) => {
                    tracing::debug!(%error, "match predicate evaluation failed, skipping rule");
                    continue;
                }
            }
        }
        MatchOutcome::NoMatch
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_models::RuleSource;
    use serde_json::json;

    fn policy(name: &str, api_group: &str, kind: &str, rule_match: &str, summary: &str) -> ActivityPolicy {
        ActivityPolicy {
            name: name.to_string(),
            api_group: api_group.to_string(),
            kind: kind.to_string(),
            audit_rules: vec![RuleSource {
                match_expr: rule_match.to_string(),
                summary: summary.to_string(),
            }],
            event_rules: vec![],
            labels: std::collections::BTreeMap::new(),
        }
    }

    fn audit_env(verb: &str) -> Env {
        Env::new().bind("audit", json!({"verb": verb}))
    }

    #[test]
    fn match_returns_first_matching_rule() {
        let cache = PolicyCache::new();
        let status = cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));
        assert!(matches!(status, PolicyStatus::Ready { .. }));

        let outcome = cache.match_record(
            RecordKind::Audit,
            &("apps".to_string(), "Deployment".to_string()),
            &audit_env("create"),
        );
        assert!(matches!(outcome, MatchOutcome::Matched { .. }));
    }

    #[test]
    fn no_match_when_predicate_false() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "delete""#,
            "deleted",
        ));
        let outcome = cache.match_record(
            RecordKind::Audit,
            &("apps".to_string(), "Deployment".to_string()),
            &audit_env("create"),
        );
        assert!(matches!(outcome, MatchOutcome::NoMatch));
    }

    #[test]
    fn upsert_with_bad_rule_does_not_regress_served_program() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));

        let bad = policy("deployments", "apps", "Deployment", "audit.verb ==", "created");
        let status = cache.upsert(&bad);
        assert!(matches!(status, PolicyStatus::NotReady { .. }));

        // The prior Ready program is still served.
        let outcome = cache.match_record(
            RecordKind::Audit,
            &("apps".to_string(), "Deployment".to_string()),
            &audit_env("create"),
        );
        assert!(matches!(outcome, MatchOutcome::Matched { .. }));
    }

    #[test]
    fn duplicate_target_from_different_policy_is_rejected() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "a",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));
        let status = cache.upsert(&policy(
            "b",
            "apps",
            "Deployment",
            r#"audit.verb == "delete""#,
            "deleted",
        ));
        assert!(matches!(status, PolicyStatus::NotReady { .. }));
    }

    #[test]
    fn delete_removes_target() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));
        cache.delete("deployments");
        let outcome = cache.match_record(
            RecordKind::Audit,
            &("apps".to_string(), "Deployment".to_string()),
            &audit_env("create"),
        );
        assert!(matches!(outcome, MatchOutcome::NoMatch));
    }

    #[test]
    fn list_policies_reflects_served_state_not_rejected_upserts() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));
        cache.upsert(&policy(
            "b",
            "apps",
            "Deployment",
            r#"audit.verb == "delete""#,
            "deleted",
        ));
        let names: Vec<String> = cache.list_policies().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["deployments".to_string()]);
    }

    #[test]
    fn retargeting_a_policy_frees_its_old_target() {
        let cache = PolicyCache::new();
        cache.upsert(&policy(
            "deployments",
            "apps",
            "Deployment",
            r#"audit.verb == "create""#,
            "created",
        ));

        // Same policy name, new target -- the old (apps, Deployment) slot
        // must be vacated, not left pointing at a policy that moved on.
        cache.upsert(&policy(
            "deployments",
            "apps",
            "StatefulSet",
            r#"audit.verb == "create""#,
            "created",
        ));

        let old_target = cache.match_record(
            RecordKind::Audit,
            &("apps".to_string(), "Deployment".to_string()),
            &audit_env("create"),
        );
        assert!(matches!(old_target, MatchOutcome::NoMatch));

        // A different policy can now claim the freed target.
        let status = cache.upsert(&policy(
            "other",
            "apps",
            "Deployment",
            r#"audit.verb == "delete""#,
            "deleted",
        ));
        assert!(matches!(status, PolicyStatus::Ready { .. }));
    }
}
