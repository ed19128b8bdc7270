use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Field-level validation failure, one per offending field.
///
/// The first sentence of a user-visible validation message capitalizes and
/// punctuates the single-error detail, or for multiple errors says "some
/// fields are missing or invalid" and directs the caller to this list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum FieldErrorKind {
    Required,
    Invalid,
    NotSupported,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: FieldErrorKind, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(field, FieldErrorKind::Invalid, detail)
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, FieldErrorKind::Required, "field is required")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation failed; one or more fields are missing or invalid.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Scope context was missing or empty. Never collapsed into a wildcard.
    #[error("tenant scope is required")]
    Scope(String),

    /// A policy rule failed to compile; `rule_index` is the offending
    /// rule's position within its (audit or event) list.
    #[error("rule {rule_index} failed to compile: {detail}")]
    Compilation { rule_index: usize, detail: String },

    /// A `match` or `summary` expression failed during evaluation.
    /// Non-fatal to the caller's batch; the record is dropped and counted.
    #[error("expression evaluation failed: {0}")]
    Evaluation(String),

    /// The column store is transiently unavailable. Internal detail is
    /// logged but never exposed to the caller.
    #[error("service unavailable")]
    StorageTransient(String),

    /// The column store returned data that failed to deserialize.
    #[error("internal error")]
    Corrupt(String),

    /// Publish to the durable bus failed; fatal to the current
    /// batch/operation.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Operation was cancelled. Not an error condition — partial progress
    /// is a legitimate, surfaced result.
    #[error("cancelled")]
    Cancelled,
}

impl AppError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }

    /// Flatten a `validator`-crate `ValidationErrors` tree (field name ->
    /// one or more `ValidationError`s, recursing into nested structs) into
    /// the flat `FieldError` list every other validation path produces.
    pub fn from_validator(errors: validator::ValidationErrors) -> Self {
        let mut out = Vec::new();
        flatten_validator_errors("", &errors, &mut out);
        Self::Validation(out)
    }

    /// Human-meaningful first sentence for the validation case, per the
    /// error-handling design: single error gets its own capitalized,
    /// punctuated detail; multiple errors get a generic pointer to the
    /// causes list.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => match errors.as_slice() {
                [single] => capitalize_sentence(&single.detail),
                _ => "Some fields are missing or invalid.".to_string(),
            },
            AppError::StorageTransient(_) => "Service unavailable.".to_string(),
            AppError::Corrupt(_) => {
                "An internal error occurred. Please contact support.".to_string()
            }
            AppError::Scope(_) => "A tenant scope is required.".to_string(),
            other => other.to_string(),
        }
    }
}

fn flatten_validator_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<FieldError>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let detail = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid"));
                    out.push(FieldError::invalid(path.clone(), detail));
                }
            }
            validator::ValidationErrorsKind::Struct(nested) => {
                flatten_validator_errors(&path, nested, out);
            }
            validator::ValidationErrorsKind::List(nested) => {
                for (index, nested) in nested {
                    flatten_validator_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

fn capitalize_sentence(detail: &str) -> String {
    let mut s = String::with_capacity(detail.len() + 1);
    let mut chars = detail.chars();
    if let Some(first) = chars.next() {
        s.extend(first.to_uppercase());
        s.push_str(chars.as_str());
    }
    if !s.ends_with('.') && !s.ends_with('!') && !s.ends_with('?') {
        s.push('.');
    }
    s
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    causes: Option<Vec<FieldError>>,
}

#[cfg(feature = "http")]
mod http_support {
    use super::*;
    use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

    impl ResponseError for AppError {
        fn status_code(&self) -> StatusCode {
            match self {
                AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::Validation(_) => StatusCode::BAD_REQUEST,
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::Unauthorized => StatusCode::UNAUTHORIZED,
                AppError::Forbidden => StatusCode::FORBIDDEN,
                AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
                AppError::Scope(_) => StatusCode::FORBIDDEN,
                AppError::Compilation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AppError::Evaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AppError::StorageTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
                AppError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::Publish(_) => StatusCode::BAD_GATEWAY,
                AppError::Cancelled => StatusCode::from_u16(499).unwrap(),
            }
        }

        fn error_response(&self) -> HttpResponse {
            if matches!(self, AppError::Corrupt(detail) if !detail.is_empty()) {
                tracing::error!(error = %self, "storage data corruption");
            }
            let causes = match self {
                AppError::Validation(errors) => Some(errors.clone()),
                _ => None,
            };
            HttpResponse::build(self.status_code()).json(ErrorResponse {
                error: self.status_code().to_string(),
                message: self.user_message(),
                causes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_validation_error_is_capitalized_and_punctuated() {
        let err = AppError::validation(vec![FieldError::invalid(
            "spec",
            "time range of 48h exceeds maximum of 24h",
        )]);
        assert_eq!(
            err.user_message(),
            "Time range of 48h exceeds maximum of 24h."
        );
    }

    #[test]
    fn multiple_validation_errors_point_to_causes() {
        let err = AppError::validation(vec![
            FieldError::required("startTime"),
            FieldError::required("endTime"),
        ]);
        assert_eq!(err.user_message(), "Some fields are missing or invalid.");
    }

    #[test]
    fn storage_transient_hides_detail() {
        let err = AppError::StorageTransient("connection reset by peer".to_string());
        assert_eq!(err.user_message(), "Service unavailable.");
    }

    #[test]
    fn corrupt_storage_is_user_safe() {
        let err = AppError::Corrupt("checksum mismatch on row".to_string());
        assert_eq!(
            err.user_message(),
            "An internal error occurred. Please contact support."
        );
    }

    #[test]
    fn from_validator_flattens_nested_struct_errors() {
        use validator::Validate;

        #[derive(Validate)]
        struct Inner {
            #[validate(length(min = 1, message = "name must not be empty"))]
            name: String,
        }

        #[derive(Validate)]
        struct Outer {
            #[validate]
            inner: Inner,
        }

        let outer = Outer {
            inner: Inner {
                name: String::new(),
            },
        };
        let errors = outer.validate().unwrap_err();
        let AppError::Validation(fields) = AppError::from_validator(errors) else {
            panic!("expected Validation");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "inner.name");
        assert_eq!(fields[0].detail, "name must not be empty");
    }
}
