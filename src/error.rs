use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::engine::EngineError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store credentials are missing or malformed.
    #[error("store not configured: {0}")]
    NotConfigured(String),
    /// Store is unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The store refused the write.
    #[error("rejected by store: {0}")]
    Rejected(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Configuration(message) => ServiceError::NotConfigured(message),
            EngineError::Connectivity(message) => ServiceError::Unavailable(message),
            EngineError::Timeout => ServiceError::Timeout,
            EngineError::Rejected(message) => ServiceError::Rejected(message),
            EngineError::NoCurrentSettings => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request was well formed but the store refused it.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotConfigured(message) => {
                AppError::ServiceUnavailable(format!("store not configured: {message}"))
            }
            ServiceError::Unavailable(message) => AppError::ServiceUnavailable(message),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Rejected(message) => AppError::Unprocessable(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: EngineError) -> StatusCode {
        AppError::from(ServiceError::from(err)).status()
    }

    #[test]
    fn engine_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(EngineError::Configuration("missing".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(EngineError::Connectivity("refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(EngineError::Timeout), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(EngineError::Rejected("check constraint".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(EngineError::NoCurrentSettings),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = AppError::from(ValidationErrors::new());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
