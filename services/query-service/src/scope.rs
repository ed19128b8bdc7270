use actix_web::HttpRequest;

use activity_common::{AppError, FieldError};
use activity_models::{Scope, ScopeType};

/// The aggregated API's authn/authz layer is out of scope for this
/// service (§1): it is expected to resolve the caller's principal to a
/// tenant scope and forward it as `X-Scope-Type`/`X-Scope-Name` headers.
/// A missing or unrecognized scope is a fatal `AppError::Scope`, never
/// collapsed into a wildcard (§4.4.1).
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
