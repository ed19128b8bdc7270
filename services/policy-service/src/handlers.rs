use std::sync::Arc;

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Serialize;
use validator::Validate;

use activity_common::{ApiResponse, AppError, Result};
use activity_models::ActivityPolicy;
use activity_policy_cache::{PolicyCache, PolicyStatus};

use crate::store::PolicyStore;

pub struct AppState {
    pub cache: Arc<PolicyCache>,
    pub store: PolicyStore,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
enum PolicyStatusResponse {
    Ready { policy_version: String },
    NotReady { causes: Vec<CauseResponse> },
}

#[derive(Debug, Serialize)]
struct CauseResponse {
    list: &'static str,
    rule_index: usize,
    detail: String,
}

impl From<PolicyStatus> for PolicyStatusResponse {
    fn from(status: PolicyStatus) -> Self {
        match status {
            PolicyStatus::Ready { policy_version } => PolicyStatusResponse::Ready { policy_version },
            PolicyStatus::NotReady { causes } => PolicyStatusResponse::NotReady {
                causes: causes
                    .into_iter()
                    .map(|c| CauseResponse {
                        list: match c.list {
                            activity_policy_cache::RuleList::Audit => "audit",
                            activity_policy_cache::RuleList::Event => "event",
                        },
                        rule_index: c.rule_index,
                        detail: c.detail,
                    })
                    .collect(),
            },
        }
    }
}

/// Admit a policy: validate its structural shape, persist it, then compile
/// and swap it into the cache. Persistence happens first so a policy that
/// fails to *compile* is still durably recorded for operator review (§7's
/// `Compilation` error retains the policy's prior served state, never its
/// prior stored definition) -- but a structurally invalid request (empty
/// name/kind, empty rule source text) never reaches the store at all.
#[post("/policies")]
async fn upsert_policy(
    state: web::Data<AppState>,
    policy: web::Json<ActivityPolicy>,
) -> Result<HttpResponse> {
    policy.validate().map_err(AppError::from_validator)?;
    state.store.upsert(&policy).await?;
    let status = state.cache.upsert(&policy);
    let body: PolicyStatusResponse = status.into();
    Ok(HttpResponse::Ok().json(ApiResponse::success(body)))
}

#[delete("/policies/{name}")]
async fn delete_policy(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    state.store.delete(&name).await?;
    state.cache.delete(&name);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/policies")]
async fn list_policies(state: web::Data<AppState>) -> Result<HttpResponse> {
    let policies = state.cache.list_policies();
    Ok(HttpResponse::Ok().json(ApiResponse::success(policies)))
}

#[get("/policies/{name}/status")]
async fn policy_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    match state.cache.status_of(&name) {
        Some(status) => {
            let body: PolicyStatusResponse = status.into();
            Ok(HttpResponse::Ok().json(ApiResponse::success(body)))
        }
        None => Err(AppError::NotFound(format!("policy {name:?} has no recorded status"))),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upsert_policy)
        .service(delete_policy)
        .service(list_policies)
        .service(policy_status);
}
