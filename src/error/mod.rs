//! Domain error vocabulary shared by the domain layer and the handler set

use thiserror::Error;

/// Result type returned by every domain operation
pub type Result<T> = std::result::Result<T, AppError>;

/// Domain-level error kinds.
///
/// These never reach the caller directly: the API layer translates them
/// into transport errors exactly once (see [`crate::api::error::translate`]).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable name of the error kind, used for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

// Only field names and error codes are kept; `params` carry the rejected
// values, which may be passwords.
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let field = if field == "__all__" { "request" } else { field.as_ref() };
                let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}
