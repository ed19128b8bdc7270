use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use activity_common::{AppError, FieldError};
use activity_database::StoreKind;

use crate::config::QueryConfig;
use crate::cursor::Cursor;
use crate::field_label::{field_selector_predicate, label_selector_predicate};
use crate::time::parse_time;

/// The caller-supplied, not-yet-validated query. Every field is a raw
/// string or primitive so it can come straight off a wire request.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub start_time: String,
    pub end_time: String,
    pub namespace: Option<String>,
    pub change_source: Option<String>,
    pub resource_kind: Option<String>,
    pub resource_uid: Option<String>,
    pub api_group: Option<String>,
    pub actor_name: Option<String>,
    pub search: Option<String>,
    pub filter: Option<String>,
    /// §6 `fieldSelector` -- a `key=value,...` selector over the record's
    /// indexed fields. Translated into an additional predicate clause and
    /// conjoined with `filter`; see [`field_selector_predicate`].
    pub field_selector: Option<String>,
    /// §6 `labelSelector` -- a `key=value,...` selector over
    /// `metadata.labels`. Only the activity record carries labels.
    pub label_selector: Option<String>,
    pub limit: i64,
    pub continue_token: Option<String>,
}

/// Position to resume from, decoded out of a continuation cursor.
#[derive(Debug, Clone)]
pub struct After {
    pub event_time: DateTime<Utc>,
    pub record_id: String,
}

/// A [`QuerySpec`] that has passed every structural check in §4.4.1.
/// `fingerprint` is the value any continuation cursor this query produces
/// will carry, and the value any incoming `continue_token` was checked
/// against.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub namespace: Option<String>,
    pub change_source: Option<String>,
    pub resource_kind: Option<String>,
    pub resource_uid: Option<String>,
    pub api_group: Option<String>,
    pub actor_name: Option<String>,
    pub search: Option<String>,
    pub filter: Option<String>,
    pub limit: i64,
    pub after: Option<After>,
    pub fingerprint: String,
}

impl QuerySpec {
    pub fn validate(
        &self,
        kind: StoreKind,
        config: &QueryConfig,
        now: DateTime<Utc>,
    ) -> Result<ValidatedQuery, AppError> {
        let mut errors = Vec::new();

        let mut filter_clauses = Vec::new();
        if let Some(source) = &self.filter {
            filter_clauses.push(source.clone());
        }
        match self
            .field_selector
            .as_deref()
            .map(|raw| field_selector_predicate(kind, raw))
            .transpose()
        {
            Ok(Some(Some(clause))) => filter_clauses.push(clause),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
        match self
            .label_selector
            .as_deref()
            .map(|raw| label_selector_predicate(kind, raw))
            .transpose()
        {
            Ok(Some(Some(clause))) => filter_clauses.push(clause),
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
        let filter = if filter_clauses.is_empty() {
            None
        } else {
            Some(filter_clauses.join(" && "))
        };

        let start_time = parse_time("startTime", &self.start_time, now).map_err(|e| errors.push(e));
        let end_time = parse_time("endTime", &self.end_time, now).map_err(|e| errors.push(e));

        if let (Ok(start), Ok(end)) = (start_time, end_time) {
            if end <= start {
                errors.push(FieldError::invalid(
                    "endTime",
                    "endTime must be after startTime",
                ));
            } else if !config.max_query_window.is_zero() && end - start > config.max_query_window
            {
                errors.push(FieldError::invalid(
                    "endTime",
                    format!(
                        "time range of {} exceeds maximum of {}",
                        humanize(end - start),
                        humanize(config.max_query_window)
                    ),
                ));
            }
        }

        if let Some(change_source) = self.change_source.as_deref() {
            if change_source != "human" && change_source != "system" {
                errors.push(FieldError::invalid(
                    "changeSource",
                    format!(
                        "changeSource must be one of \"human\", \"system\", got {change_source:?}"
                    ),
                ));
            }
        }

        let limit = if self.limit < 0 {
            errors.push(FieldError::invalid("limit", "limit must not be negative"));
            config.default_page_size
        } else if self.limit == 0 {
            config.default_page_size
        } else if self.limit > config.effective_max_page_size() {
            errors.push(FieldError::invalid(
                "limit",
                format!(
                    "limit of {} exceeds maximum of {}",
                    self.limit,
                    config.effective_max_page_size()
                ),
            ));
            config.default_page_size
        } else {
            self.limit
        };

        let fingerprint = self.fingerprint();

        let after = match &self.continue_token {
            None => None,
            Some(token) => match Cursor::decode(token) {
                Ok(cursor) if cursor.fingerprint == fingerprint => Some(After {
                    event_time: cursor.event_time,
                    record_id: cursor.record_id,
                }),
                Ok(_) => {
                    errors.push(FieldError::invalid(
                        "continue",
                        "continuation cursor does not match the current query",
                    ));
                    None
                }
                Err(_) => {
                    errors.push(FieldError::invalid(
                        "continue",
                        "invalid continuation cursor",
                    ));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }

        Ok(ValidatedQuery {
            start_time: start_time.unwrap(),
            end_time: end_time.unwrap(),
            namespace: self.namespace.clone(),
            change_source: self.change_source.clone(),
            resource_kind: self.resource_kind.clone(),
            resource_uid: self.resource_uid.clone(),
            api_group: self.api_group.clone(),
            actor_name: self.actor_name.clone(),
            search: self.search.clone(),
            filter,
            limit,
            after,
            fingerprint,
        })
    }

    /// SHA-256 over every field that changes what rows a query selects.
    /// `limit` and `continue_token` are excluded: changing page size or
    /// resuming from a cursor must not itself invalidate that cursor.
    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.namespace.as_deref().unwrap_or(""),
            self.change_source.as_deref().unwrap_or(""),
            self.resource_kind.as_deref().unwrap_or(""),
            self.resource_uid.as_deref().unwrap_or(""),
            self.api_group.as_deref().unwrap_or(""),
            self.actor_name.as_deref().unwrap_or(""),
            self.search.as_deref().unwrap_or(""),
            self.filter.as_deref().unwrap_or(""),
            self.field_selector.as_deref().unwrap_or(""),
            self.label_selector.as_deref().unwrap_or(""),
        ] {
            hasher.update(field.as_bytes());
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }
}

fn humanize(duration: chrono::Duration) -> String {
    let hours = duration.num_hours();
    if hours >= 24 && hours % 24 == 0 {
        format!("{}d", hours / 24)
    } else {
        format!("{}h", hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-07-28T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn base_spec() -> QuerySpec {
        QuerySpec {
            start_time: "now-24h".to_string(),
            end_time: "now".to_string(),
            limit: 50,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_end_before_start() {
        let mut spec = base_spec();
        spec.start_time = "now".to_string();
        spec.end_time = "now-24h".to_string();
        let err = spec
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_window_exceeding_max() {
        let mut config = QueryConfig::default();
        config.max_query_window = chrono::Duration::hours(1);
        let err = base_spec()
            .validate(StoreKind::Activity, &config, now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_negative_limit() {
        let mut spec = base_spec();
        spec.limit = -1;
        assert!(spec
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .is_err());
    }

    #[test]
    fn accepts_matching_continue_token() {
        let spec = base_spec();
        let validated = spec
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap();
        let cursor = Cursor {
            event_time: now(),
            record_id: "r1".to_string(),
            fingerprint: validated.fingerprint.clone(),
        };
        let mut resumed = spec.clone();
        resumed.continue_token = Some(cursor.encode());
        let resumed = resumed
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap();
        assert_eq!(resumed.after.unwrap().record_id, "r1");
    }

    #[test]
    fn rejects_a_change_source_outside_human_or_system() {
        let mut spec = base_spec();
        spec.change_source = Some("banana".to_string());
        let err = spec
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected Validation");
        };
        assert_eq!(fields[0].field, "changeSource");
    }

    #[test]
    fn accepts_human_and_system_change_source() {
        for value in ["human", "system"] {
            let mut spec = base_spec();
            spec.change_source = Some(value.to_string());
            assert!(spec
                .validate(StoreKind::Activity, &QueryConfig::default(), now())
                .is_ok());
        }
    }

    #[test]
    fn rejects_continue_token_from_a_different_query() {
        let spec = base_spec();
        let cursor = Cursor {
            event_time: now(),
            record_id: "r1".to_string(),
            fingerprint: "stale-fingerprint".to_string(),
        };
        let mut resumed = spec;
        resumed.continue_token = Some(cursor.encode());
        assert!(resumed
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .is_err());
    }

    #[test]
    fn field_selector_is_conjoined_with_an_explicit_filter() {
        let mut spec = base_spec();
        spec.filter = Some(r#"activity.spec.actor.name == "alice""#.to_string());
        spec.field_selector = Some("spec.changeSource=human".to_string());
        let validated = spec
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap();
        assert_eq!(
            validated.filter.as_deref(),
            Some(
                r#"activity.spec.actor.name == "alice" && activity.spec.changeSource == "human""#
            )
        );
    }

    #[test]
    fn label_selector_is_rejected_for_non_activity_kinds() {
        let mut spec = base_spec();
        spec.label_selector = Some("team=platform".to_string());
        let err = spec
            .validate(StoreKind::Event, &QueryConfig::default(), now())
            .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected Validation");
        };
        assert_eq!(fields[0].field, "labelSelector");
    }

    #[test]
    fn unmapped_event_field_selector_key_is_a_validation_error() {
        let mut spec = base_spec();
        spec.field_selector = Some("bogus=x".to_string());
        let err = spec
            .validate(StoreKind::Event, &QueryConfig::default(), now())
            .unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected Validation");
        };
        assert_eq!(fields[0].field, "fieldSelector");
    }

    #[test]
    fn selectors_change_the_fingerprint() {
        let plain = base_spec();
        let mut selected = base_spec();
        selected.field_selector = Some("spec.changeSource=human".to_string());
        let plain = plain
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap();
        let selected = selected
            .validate(StoreKind::Activity, &QueryConfig::default(), now())
            .unwrap();
        assert_ne!(plain.fingerprint, selected.fingerprint);
    }
}
