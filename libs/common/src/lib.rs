pub mod error;
pub mod response;
pub mod utils;

pub use error::{AppError, FieldError, FieldErrorKind, Result};
pub use response::ApiResponse;
