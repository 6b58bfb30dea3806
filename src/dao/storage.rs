use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The request did not complete within the configured bound.
    #[error("storage request timed out")]
    Timeout,
    /// The store refused the request (constraint violation, bad payload).
    #[error("storage rejected the request: {message}")]
    Rejected { message: String },
    /// The store refused the credentials; nothing will succeed until they change.
    #[error("storage refused the credentials: {message}")]
    Unauthorized { message: String },
    /// The addressed row or function does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        StorageError::Rejected {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        StorageError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound { what: what.into() }
    }
}
