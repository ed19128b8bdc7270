use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;

use activity_common::{ApiResponse, Result};
use activity_database::StoreKind;
use activity_query::{FacetSpec, QueryEngine, QueryItem, QuerySpec};
use activity_database::PgColumnStore;

use crate::dto::{FacetSpecRequest, PageResponse, QuerySpecRequest};
use crate::scope::scope_from_request;
use crate::state::AppState;

fn item_to_json(item: QueryItem) -> serde_json::Value {
    match item {
        QueryItem::Audit(record) => serde_json::to_value(record).unwrap_or_default(),
        QueryItem::Event(record) => serde_json::to_value(record).unwrap_or_default(),
        QueryItem::Activity(activity) => serde_json::to_value(activity).unwrap_or_default(),
    }
}

pub async fn query(
    req: HttpRequest,
    state: web::Data<AppState>,
    kind: StoreKind,
    spec: web::Json<QuerySpecRequest>,
) -> Result<HttpResponse> {
    let scope = scope_from_request(&req)?;
    let spec: QuerySpec = spec.into_inner().into();
    let page = run(&state.engine, kind, &spec, scope).await?;
    let body = PageResponse {
        items: page.items.into_iter().map(item_to_json).collect(),
        r#continue: page.continue_token,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(body)))
}

async fn run(
    engine: &QueryEngine<PgColumnStore>,
    kind: StoreKind,
    spec: &QuerySpec,
    scope: activity_models::Scope,
) -> Result<activity_query::Page<QueryItem>> {
    Ok(engine.query(kind, spec, scope, Utc::now()).await?)
}

pub async fn facet(
    req: HttpRequest,
    state: web::Data<AppState>,
    kind: StoreKind,
    spec: web::Json<FacetSpecRequest>,
) -> Result<HttpResponse> {
    let scope = scope_from_request(&req)?;
    let spec: FacetSpec = spec.into_inner().into();
    let results = state.engine.facet(kind, &spec, scope, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(results_to_json(results))))
}

fn results_to_json(results: Vec<activity_query::FacetResult>) -> Vec<serde_json::Value> {
    results
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "field": r.field,
                "values": r.values.iter().map(|v| serde_json::json!({
                    "value": v.value,
                    "count": v.count,
                })).collect::<Vec<_>>(),
            })
        })
        .collect()
}
