use serde::{Deserialize, Serialize};

use activity_query::{FacetRequest, FacetSpec, QuerySpec};

/// Wire shape of the query endpoints' spec document (§6). `watch` and
/// `resourceVersion` are accepted and round-tripped for API-surface
/// compatibility but never acted on -- the real-time-streaming Non-goal
/// means this service has no notion of a watch stream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpecRequest {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub change_source: Option<String>,
    #[serde(default)]
    pub resource_kind: Option<String>,
    #[serde(default)]
    pub resource_uid: Option<String>,
    #[serde(default)]
    pub api_group: Option<String>,
    #[serde(default)]
    pub actor_name: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub field_selector: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub r#continue: Option<String>,
    #[serde(default)]
    pub watch: Option<bool>,
    #[serde(default)]
    pub resource_version: Option<String>,
}

impl From<QuerySpecRequest> for QuerySpec {
    fn from(req: QuerySpecRequest) -> Self {
        QuerySpec {
            start_time: req.start,
            end_time: req.end,
            namespace: req.namespace,
            change_source: req.change_source,
            resource_kind: req.resource_kind,
            resource_uid: req.resource_uid,
            api_group: req.api_group,
            actor_name: req.actor_name,
            search: req.search,
            filter: req.filter,
            field_selector: req.field_selector,
            label_selector: req.label_selector,
            limit: req.limit.unwrap_or(0),
            continue_token: req.r#continue,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub r#continue: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetRequestDto {
    pub field: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSpecRequest {
    #[serde(default)]
    pub time_range: Option<TimeRangeDto>,
    #[serde(default)]
    pub filter: Option<String>,
    pub facets: Vec<FacetRequestDto>,
}

#[derive(Debug, Deserialize)]
pub struct TimeRangeDto {
    pub start: String,
    pub end: String,
}

impl From<FacetSpecRequest> for FacetSpec {
    fn from(req: FacetSpecRequest) -> Self {
        let (start_time, end_time) = match req.time_range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };
        FacetSpec {
            start_time,
            end_time,
            filter: req.filter,
            facets: req
                .facets
                .into_iter()
                .map(|f| FacetRequest {
                    field: f.field,
                    limit: f.limit,
                })
                .collect(),
        }
    }
}
