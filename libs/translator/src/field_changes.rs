use activity_models::FieldChange;
use serde_json::Value as Json;

/// Shallow top-level diff between an audit record's `requestObject` and
/// `responseObject`, bounded to top-level keys to avoid unbounded
/// recursion into arbitrary nested payloads (the Non-goal against
/// preserving untyped payload fields beyond what a policy extracts).
///
/// A key present in both with equal values is not a change. A key only in
/// `responseObject` is a field the server defaulted or computed (`old:
/// None`); a key only in `requestObject` is one the response dropped
/// (`new: None`).
pub fn diff_top_level(request: &Json, response: &Json) -> Vec<FieldChange> {
    let (Json::Object(request_map), Json::Object(response_map)) = (request, response) else {
        return Vec::new();
    };

    let mut fields: Vec<&String> = request_map.keys().chain(response_map.keys()).collect();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let old = request_map.get(field);
            let new = response_map.get(field);
            if old == new {
                return None;
            }
            Some(FieldChange {
                field: field.clone(),
                old: old.cloned(),
                new: new.cloned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_keys_are_not_reported() {
        let request = json!({"replicas": 3, "image": "v1"});
        let response = json!({"replicas": 3, "image": "v1"});
        assert!(diff_top_level(&request, &response).is_empty());
    }

    #[test]
    fn changed_key_reports_old_and_new() {
        let request = json!({"replicas": 3});
        let response = json!({"replicas": 5});
        let changes = diff_top_level(&request, &response);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "replicas");
        assert_eq!(changes[0].old, Some(json!(3)));
        assert_eq!(changes[0].new, Some(json!(5)));
    }

    #[test]
    fn key_only_in_response_has_no_old_value() {
        let request = json!({});
        let response = json!({"status": "Ready"});
        let changes = diff_top_level(&request, &response);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old, None);
        assert_eq!(changes[0].new, Some(json!("Ready")));
    }

    #[test]
    fn non_objects_produce_no_changes() {
        assert!(diff_top_level(&json!("x"), &json!("y")).is_empty());
    }
}
