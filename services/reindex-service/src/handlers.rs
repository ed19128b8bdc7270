use actix_web::{get, post, web, HttpRequest, HttpResponse};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use activity_common::{AppError, Result};
use activity_reindex::RunState;

use crate::dto::{state_label, RunAccepted, RunRequest, RunStatusResponse};
use crate::scope::scope_from_request;
use crate::state::AppState;

#[post("/reindex")]
async fn start_run(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RunRequest>,
) -> Result<HttpResponse> {
    let scope = scope_from_request(&req)?;
    let opts = body.into_inner().into_options()?;

    let (run_id, cancellation) = state.registry.start();
    let reindexer = state.reindexer.clone();
    let registry = state.registry.clone();

    tokio::spawn(run_to_completion(
        reindexer,
        registry,
        run_id,
        scope,
        opts,
        cancellation,
    ));

    Ok(HttpResponse::Accepted().json(RunAccepted { run_id }))
}

async fn run_to_completion(
    reindexer: std::sync::Arc<activity_reindex::Reindexer<activity_database::PgColumnStore>>,
    registry: std::sync::Arc<crate::runs::RunRegistry>,
    run_id: Uuid,
    scope: activity_models::Scope,
    opts: activity_reindex::RunOptions,
    cancellation: CancellationToken,
) {
    registry.update(run_id, RunState::Running, Default::default());
    let outcome = reindexer
        .run(scope, opts, cancellation, |progress| {
            registry.update(run_id, RunState::Running, progress.clone());
        })
        .await;
    registry.update(run_id, outcome.state, outcome.progress);
}

#[get("/reindex/{id}")]
async fn run_status(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let run_id = path.into_inner();
    let snapshot = state
        .registry
        .get(run_id)
        .ok_or_else(|| AppError::NotFound(format!("no re-index run with id {run_id}")))?;

    Ok(HttpResponse::Ok().json(RunStatusResponse {
        run_id,
        state: state_label(snapshot.state),
        progress: snapshot.progress.into(),
    }))
}

#[post("/reindex/{id}/cancel")]
async fn cancel_run(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let run_id = path.into_inner();
    if !state.registry.cancel(run_id) {
        return Err(AppError::NotFound(format!(
            "no re-index run with id {run_id}"
        )));
    }
    Ok(HttpResponse::Accepted().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(start_run).service(run_status).service(cancel_run);
}
