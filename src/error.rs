use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Application error type covering the engine's failure taxonomy.
///
/// Every operation returns a typed error rather than panicking across the
/// collaborator boundary; the HTTP layer translates each kind to a status
/// code and a stable machine-readable error code.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced user/conversation/message/invitation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the required role or membership.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Attempted transition violates a current-state invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed identifiers or empty required fields.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Idempotent delete re-invoked on an already tombstoned message.
    #[error("already deleted: {0}")]
    AlreadyDeleted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyDeleted(_) => StatusCode::GONE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::AlreadyDeleted(_) => "ALREADY_DELETED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get a user-friendly error message (without internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::FORBIDDEN {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Operation forbidden"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let response_body = json!({
            "error": self.user_message(),
            "error_code": self.error_code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(response_body)).into_response()
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn already_deleted(msg: impl Into<String>) -> Self {
        AppError::AlreadyDeleted(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::already_deleted("x").status_code(), StatusCode::GONE);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::internal("lock poisoned at 0xdeadbeef");
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
