use actix_web::{post, web, HttpRequest, HttpResponse};

use activity_common::Result;
use activity_database::StoreKind;

use crate::dto::{FacetSpecRequest, QuerySpecRequest};
use crate::ops;
use crate::state::AppState;

#[post("/auditlogs/query")]
async fn query(
    req: HttpRequest,
    state: web::Data<AppState>,
    spec: web::Json<QuerySpecRequest>,
) -> Result<HttpResponse> {
    ops::query(req, state, StoreKind::Audit, spec).await
}

#[post("/auditlogs/facet")]
async fn facet(
    req: HttpRequest,
    state: web::Data<AppState>,
    spec: web::Json<FacetSpecRequest>,
) -> Result<HttpResponse> {
    ops::facet(req, state, StoreKind::Audit, spec).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(query).service(facet);
}
