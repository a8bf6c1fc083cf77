//! Translation of domain errors into transport errors.
//!
//! A domain `AppError` becomes an `ApiError` exactly once, through
//! [`translate`] or the [`Translate`] extension. The result type changes on
//! translation, so an already-translated error cannot be translated again.
//! Diagnostic context (operation, target id, raw cause) is written to the
//! log when the response is produced and never serialized into the body.

use crate::error::AppError;
use crate::policy::Denial;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};

/// Transport-level error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    Internal,
    Cancelled,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "Authentication required",
            ErrorKind::Forbidden => "Insufficient privileges",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Conflict => "Resource already exists",
            ErrorKind::Internal => "An internal error occurred",
            ErrorKind::Cancelled => "Request cancelled",
        }
    }
}

/// Request-local context attached to an error for server-side logging only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub operation: &'static str,
    pub target_id: Option<String>,
}

impl Diagnostic {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            target_id: None,
        }
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }
}

/// Error reported to the caller: a status plus a safe message.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    diagnostic: Diagnostic,
    cause: Option<String>,
}

impl ApiError {
    fn new(kind: ErrorKind, diagnostic: Diagnostic) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            diagnostic,
            cause: None,
        }
    }

    pub fn unauthenticated(diagnostic: Diagnostic) -> Self {
        Self::new(ErrorKind::Unauthenticated, diagnostic)
    }

    pub fn forbidden(diagnostic: Diagnostic) -> Self {
        Self::new(ErrorKind::Forbidden, diagnostic)
    }

    pub fn cancelled(diagnostic: Diagnostic) -> Self {
        Self::new(ErrorKind::Cancelled, diagnostic)
    }

    /// Failure that is never attributed to the request's input.
    pub fn internal(diagnostic: Diagnostic, cause: impl std::fmt::Display) -> Self {
        Self {
            cause: Some(cause.to_string()),
            ..Self::new(ErrorKind::Internal, diagnostic)
        }
    }

    /// Payload that could not be decoded.
    pub fn bad_request(diagnostic: Diagnostic, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(ErrorKind::Validation, diagnostic)
        }
    }

    pub fn denied(denial: Denial, diagnostic: Diagnostic) -> Self {
        match denial {
            Denial::Unauthenticated => Self::unauthenticated(diagnostic),
            Denial::Forbidden => Self::forbidden(diagnostic),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    fn log(&self) {
        let target_id = self.diagnostic.target_id.as_deref().unwrap_or("-");
        let cause = self.cause.as_deref().unwrap_or("-");
        if self.kind == ErrorKind::Internal {
            tracing::error!(
                operation = self.diagnostic.operation,
                target_id,
                kind = self.kind.code(),
                cause,
                "request failed"
            );
        } else {
            tracing::warn!(
                operation = self.diagnostic.operation,
                target_id,
                kind = self.kind.code(),
                cause,
                "request rejected"
            );
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

/// Maps a domain error to its transport outcome.
pub fn translate(err: AppError, diagnostic: Diagnostic) -> ApiError {
    tracing::debug!(
        operation = diagnostic.operation,
        domain_kind = err.kind_name(),
        "translating domain error"
    );

    let kind = match &err {
        AppError::NotFound(_) => ErrorKind::NotFound,
        AppError::Validation(_) => ErrorKind::Validation,
        AppError::Conflict(_) => ErrorKind::Conflict,
        AppError::InvalidCredentials => ErrorKind::Unauthenticated,
        AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
    };

    let message = match &err {
        // Validation messages are authored for the caller.
        AppError::Validation(msg) => msg.clone(),
        _ => kind.default_message().to_string(),
    };

    ApiError {
        kind,
        message,
        diagnostic,
        cause: Some(err.to_string()),
    }
}

/// Translation at the outer boundary of a handler.
pub trait Translate<T> {
    fn translate(self, diagnostic: Diagnostic) -> Result<T, ApiError>;
}

impl<T> Translate<T> for crate::error::Result<T> {
    fn translate(self, diagnostic: Diagnostic) -> Result<T, ApiError> {
        self.map_err(|err| translate(err, diagnostic))
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        counter!("userapi_errors_total", "kind" => self.kind.code()).increment(1);

        let body = Json(ErrorResponse {
            error: self.kind.code().to_string(),
            message: self.message,
        });

        (self.kind.status(), body).into_response()
    }
}
