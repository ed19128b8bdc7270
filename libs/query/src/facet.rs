use chrono::{DateTime, Utc};

use activity_common::{AppError, FieldError};
use activity_database::StoreKind;

/// One entry in a record kind's facet allowlist: the spec-facing field
/// name mapped to the SQL expression that produces it. The expression is
/// always one of this fixed set of compile-time constants -- never built
/// from caller input -- so interpolating it directly into `count_facet_values`
/// SQL carries no injection risk.
struct FacetField {
    name: &'static str,
    column: &'static str,
}

const ACTIVITY_FACET_FIELDS: &[FacetField] = &[
    FacetField {
        name: "spec.changeSource",
        column: "change_source",
    },
    FacetField {
        name: "spec.actor.name",
        column: "actor_name",
    },
    FacetField {
        name: "spec.actor.type",
        column: "payload->'spec'->'actor'->>'type'",
    },
    FacetField {
        name: "spec.resource.apiGroup",
        column: "api_group",
    },
    FacetField {
        name: "spec.resource.kind",
        column: "resource_kind",
    },
    FacetField {
        name: "spec.resource.namespace",
        column: "namespace",
    },
    FacetField {
        name: "spec.origin.type",
        column: "payload->'spec'->'origin'->>'type'",
    },
];

const AUDIT_FACET_FIELDS: &[FacetField] = &[
    FacetField {
        name: "objectRef.apiGroup",
        column: "api_group",
    },
    FacetField {
        name: "objectRef.resource",
        column: "payload->'objectRef'->>'resource'",
    },
    FacetField {
        name: "user.username",
        column: "actor_name",
    },
    FacetField {
        name: "verb",
        column: "payload->>'verb'",
    },
];

const EVENT_FACET_FIELDS: &[FacetField] = &[
    FacetField {
        name: "regarding.kind",
        column: "resource_kind",
    },
    FacetField {
        name: "regarding.namespace",
        column: "namespace",
    },
    FacetField {
        name: "reason",
        column: "payload->>'reason'",
    },
    FacetField {
        name: "type",
        column: "payload->>'type'",
    },
    FacetField {
        name: "reportingController",
        column: "actor_name",
    },
];

fn allowlist(kind: StoreKind) -> &'static [FacetField] {
    match kind {
        StoreKind::Activity => ACTIVITY_FACET_FIELDS,
        StoreKind::Audit => AUDIT_FACET_FIELDS,
        StoreKind::Event => EVENT_FACET_FIELDS,
    }
}

/// Resolve a caller-supplied facet field name to its fixed SQL expression,
/// rejecting anything off the allowlist.
fn resolve_column(kind: StoreKind, field: &str) -> Result<&'static str, FieldError> {
    allowlist(kind)
        .iter()
        .find(|f| f.name == field)
        .map(|f| f.column)
        .ok_or_else(|| FieldError::invalid("facets.field", format!("unknown facet field {field:?}")))
}

#[derive(Debug, Clone)]
pub struct FacetRequest {
    pub field: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct FacetSpec {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Accepted for parity with [`crate::spec::QuerySpec`] but intentionally
    /// never applied: facets exist to answer "what are the bounded-cardinality
    /// values of this column", and running an arbitrary predicate first would
    /// require scanning the same rows a post-filter would, defeating the
    /// point of a column-level `GROUP BY`.
    pub filter: Option<String>,
    pub facets: Vec<FacetRequest>,
}

#[derive(Debug, Clone)]
pub struct FacetValue {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct FacetResult {
    pub field: String,
    pub values: Vec<FacetValue>,
}

pub const DEFAULT_FACET_LIMIT: i64 = 20;
pub const MAX_FACET_LIMIT: i64 = 100;

pub fn validate_facet_count(facets: &[FacetRequest]) -> Result<(), AppError> {
    if facets.is_empty() || facets.len() > 10 {
        return Err(AppError::validation(vec![FieldError::invalid(
            "facets",
            "facets must contain between 1 and 10 entries",
        )]));
    }
    Ok(())
}

pub fn resolve_facet_time_range(
    spec: &FacetSpec,
    now: DateTime<Utc>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
    match (&spec.start_time, &spec.end_time) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let mut errors = Vec::new();
            let start = crate::time::parse_time("timeRange.start", start, now)
                .map_err(|e| errors.push(e))
                .ok();
            let end = crate::time::parse_time("timeRange.end", end, now)
                .map_err(|e| errors.push(e))
                .ok();
            if !errors.is_empty() {
                return Err(AppError::validation(errors));
            }
            Ok(Some((start.unwrap(), end.unwrap())))
        }
        _ => Err(AppError::validation(vec![FieldError::invalid(
            "timeRange",
            "timeRange must supply both start and end or neither",
        )])),
    }
}

pub(crate) fn resolve(kind: StoreKind, field: &str) -> Result<&'static str, AppError> {
    resolve_column(kind, field).map_err(|e| AppError::validation(vec![e]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_activity_field() {
        assert_eq!(
            resolve_column(StoreKind::Activity, "spec.changeSource").unwrap(),
            "change_source"
        );
    }

    #[test]
    fn rejects_unknown_field() {
        assert!(resolve_column(StoreKind::Activity, "spec.notReal").is_err());
    }

    #[test]
    fn rejects_field_from_the_wrong_record_kind() {
        assert!(resolve_column(StoreKind::Audit, "regarding.kind").is_err());
    }

    #[test]
    fn rejects_out_of_range_facet_count() {
        assert!(validate_facet_count(&[]).is_err());
        let too_many: Vec<FacetRequest> = (0..11)
            .map(|i| FacetRequest {
                field: format!("f{i}"),
                limit: None,
            })
            .collect();
        assert!(validate_facet_count(&too_many).is_err());
    }
}
