use activity_common::FieldError;
use activity_database::StoreKind;

/// Map an event-endpoint selector field to the internal facet/index field
/// it addresses. `None` for anything outside the fixed selector set in §6.
pub fn event_selector_to_field(selector: &str) -> Option<&'static str> {
    match selector {
        "type" => Some("type"),
        "reason" => Some("reason"),
        "involvedObject.kind" => Some("regarding.kind"),
        "involvedObject.name" => Some("regarding.name"),
        "involvedObject.namespace" => Some("regarding.namespace"),
        "involvedObject.uid" => Some("regarding.uid"),
        "source.component" => Some("reportingController"),
        "namespace" => Some("regarding.namespace"),
        _ => None,
    }
}

/// The root identifier a compiled filter expression binds a row under for
/// a given store kind -- see `passes_filter` in `engine.rs`.
fn root_name(kind: StoreKind) -> &'static str {
    match kind {
        StoreKind::Audit => "audit",
        StoreKind::Event => "event",
        StoreKind::Activity => "activity",
    }
}

/// Split a Kubernetes-style `key1=value1,key2=value2` selector into its
/// pairs. Whitespace around keys and values is trimmed; empty segments are
/// skipped so a trailing comma or blank selector yields no pairs.
fn parse_pairs(raw: &str) -> Vec<(&str, &str)> {
    raw.split(',')
        .filter(|segment| !segment.trim().is_empty())
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

/// Escape a value for embedding in a double-quoted expression-language
/// string literal.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Translate a `fieldSelector` query parameter into an expression-language
/// predicate fragment over the given store kind's bound root. Event
/// selector keys go through the fixed §6 conversion table; every other
/// kind's keys are taken as literal field paths (e.g.
/// `spec.changeSource=human` against an activity).
pub fn field_selector_predicate(kind: StoreKind, raw: &str) -> Result<Option<String>, FieldError> {
    let root = root_name(kind);
    let mut clauses = Vec::new();
    for (key, value) in parse_pairs(raw) {
        let field: String = match kind {
            StoreKind::Event => event_selector_to_field(key)
                .ok_or_else(|| {
                    FieldError::invalid(
                        "fieldSelector",
                        format!("{key:?} is not a recognized event selector field"),
                    )
                })?
                .to_string(),
            StoreKind::Audit | StoreKind::Activity => {
                if key.is_empty() {
                    return Err(FieldError::invalid("fieldSelector", "empty selector key"));
                }
                key.to_string()
            }
        };
        clauses.push(format!("{root}.{field} == \"{}\"", escape(value)));
    }
    Ok(join_clauses(clauses))
}

/// Translate a `labelSelector` query parameter into a predicate fragment
/// matching on `metadata.labels`. Only the `Activity` record carries
/// labels; any other kind rejects a non-empty selector outright rather
/// than silently matching nothing.
pub fn label_selector_predicate(kind: StoreKind, raw: &str) -> Result<Option<String>, FieldError> {
    if parse_pairs(raw).is_empty() {
        return Ok(None);
    }
    if kind != StoreKind::Activity {
        return Err(FieldError::invalid(
            "labelSelector",
            "labelSelector is only supported for activity queries",
        ));
    }
    let root = root_name(kind);
    let clauses = parse_pairs(raw)
        .into_iter()
        .map(|(key, value)| format!("{root}.metadata.labels.{key} == \"{}\"", escape(value)))
        .collect();
    Ok(join_clauses(clauses))
}

fn join_clauses(clauses: Vec<String>) -> Option<String> {
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_involved_object_fields() {
        assert_eq!(
            event_selector_to_field("involvedObject.kind"),
            Some("regarding.kind")
        );
    }

    #[test]
    fn rejects_unknown_selector() {
        assert_eq!(event_selector_to_field("bogus"), None);
    }

    #[test]
    fn event_field_selector_builds_a_conjunction() {
        let predicate =
            field_selector_predicate(StoreKind::Event, "reason=Failed,type=Warning").unwrap();
        assert_eq!(
            predicate,
            Some(r#"event.reason == "Failed" && event.type == "Warning""#.to_string())
        );
    }

    #[test]
    fn event_field_selector_rejects_unmapped_keys() {
        let err = field_selector_predicate(StoreKind::Event, "bogus=x").unwrap_err();
        assert_eq!(err.field, "fieldSelector");
    }

    #[test]
    fn activity_field_selector_uses_the_literal_field_path() {
        let predicate =
            field_selector_predicate(StoreKind::Activity, "spec.changeSource=human").unwrap();
        assert_eq!(
            predicate,
            Some(r#"activity.spec.changeSource == "human""#.to_string())
        );
    }

    #[test]
    fn label_selector_matches_activity_metadata_labels() {
        let predicate =
            label_selector_predicate(StoreKind::Activity, "team=platform").unwrap();
        assert_eq!(
            predicate,
            Some(r#"activity.metadata.labels.team == "platform""#.to_string())
        );
    }

    #[test]
    fn label_selector_rejects_non_activity_kinds() {
        let err = label_selector_predicate(StoreKind::Event, "team=platform").unwrap_err();
        assert_eq!(err.field, "labelSelector");
    }

    #[test]
    fn empty_selectors_produce_no_predicate() {
        assert_eq!(field_selector_predicate(StoreKind::Event, "").unwrap(), None);
        assert_eq!(
            label_selector_predicate(StoreKind::Audit, "").unwrap(),
            None
        );
    }
}
