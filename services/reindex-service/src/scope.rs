use actix_web::HttpRequest;

use activity_common::{AppError, FieldError};
use activity_models::{Scope, ScopeType};

/// Same hand-off contract as `query-service`: the aggregated API's authn
/// layer resolves the caller's principal to a tenant scope and forwards it
/// as `X-Scope-Type`/`X-Scope-Name`. A re-index run is always scoped to
/// exactly one tenant (§4.5), never the platform wildcard.
pub fn scope_from_request(req: &HttpRequest) -> Result<Scope, AppError> {
    let scope_type = req
        .headers()
        .get("X-Scope-Type")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Scope("missing X-Scope-Type header".to_string()))?;
    let scope_name = req
        .headers()
        .get("X-Scope-Name")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Scope("missing X-Scope-Name header".to_string()))?;

    let scope_type = match scope_type {
        "platform" => ScopeType::Platform,
        "organization" => ScopeType::Organization,
        "project" => ScopeType::Project,
        "user" => ScopeType::User,
        other => {
            return Err(AppError::validation(vec![FieldError::invalid(
                "X-Scope-Type",
                format!("unrecognized scope type {other:?}"),
            )]))
        }
    };

    Ok(Scope::new(scope_type, scope_name))
}
