use std::collections::HashSet;

use activity_policy_cache::PolicyCache;

use crate::options::RunOptions;

/// Resolve `policy_names`/`match_labels` against the currently-served
/// policy set. Both selectors apply together (AND) when both are given:
/// a policy must pass the name filter, if any, and match every listed
/// label, if any.
pub fn resolve_selection(cache: &PolicyCache, opts: &RunOptions) -> HashSet<String> {
    cache
        .list_policies()
        .into_iter()
        .filter(|policy| match &opts.policy_names {
            Some(names) => names.iter().any(|n| n == &policy.name),
            None => true,
        })
        .filter(|policy| match &opts.match_labels {
            Some(labels) => policy.matches_labels(labels),
            None => true,
        })
        .map(|policy| policy.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_models::ActivityPolicy;
    use std::collections::BTreeMap;

    fn policy(name: &str, labels: &[(&str, &str)]) -> ActivityPolicy {
        ActivityPolicy {
            name: name.to_string(),
            api_group: "apps".to_string(),
            kind: name.to_string(),
            audit_rules: vec![],
            event_rules: vec![],
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn base_opts() -> RunOptions {
        RunOptions {
            start_time: chrono::Utc::now(),
            end_time: chrono::Utc::now(),
            batch_size: 100,
            rate_limit: 0,
            dry_run: true,
            policy_names: None,
            match_labels: None,
        }
    }

    #[test]
    fn no_selectors_means_every_served_policy() {
        let cache = PolicyCache::new();
        cache.upsert(&policy("a", &[]));
        cache.upsert(&policy("b", &[]));
        let selected = resolve_selection(&cache, &base_opts());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn policy_names_restricts_to_exact_matches() {
        let cache = PolicyCache::new();
        cache.upsert(&policy("a", &[]));
        cache.upsert(&policy("b", &[]));
        let mut opts = base_opts();
        opts.policy_names = Some(vec!["a".to_string()]);
        let selected = resolve_selection(&cache, &opts);
        assert_eq!(selected, HashSet::from(["a".to_string()]));
    }

    #[test]
    fn match_labels_requires_all_listed_labels() {
        let cache = PolicyCache::new();
        cache.upsert(&policy("a", &[("team", "platform")]));
        cache.upsert(&policy("b", &[("team", "other")]));
        let mut opts = base_opts();
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "platform".to_string());
        opts.match_labels = Some(labels);
        let selected = resolve_selection(&cache, &opts);
        assert_eq!(selected, HashSet::from(["a".to_string()]));
    }

    #[test]
    fn unmatched_selection_is_empty_not_an_error() {
        let cache = PolicyCache::new();
        cache.upsert(&policy("a", &[]));
        let mut opts = base_opts();
        opts.policy_names = Some(vec!["nonexistent".to_string()]);
        assert!(resolve_selection(&cache, &opts).is_empty());
    }
}
