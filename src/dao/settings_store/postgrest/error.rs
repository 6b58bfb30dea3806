//! Error types shared by the PostgREST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`PostgrestError`] failures.
pub type PostgrestResult<T> = Result<T, PostgrestError>;

/// Problems with the connection settings, detected before any request is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreConfigError {
    /// Required environment variable is missing or blank.
    #[error("missing store environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Base URL cannot be used to reach a PostgREST endpoint.
    #[error("invalid store URL `{value}`: {reason}")]
    InvalidUrl { value: String, reason: String },
    /// Access key is structurally invalid.
    #[error("invalid store access key: {reason}")]
    InvalidKey { reason: &'static str },
}

/// Failures that can occur while interacting with PostgREST.
#[derive(Debug, Error)]
pub enum PostgrestError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build PostgREST client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A resource path could not be joined onto the REST root.
    #[error("invalid PostgREST path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    /// The request could not be sent or the connection dropped.
    #[error("failed to send PostgREST request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The request exceeded the configured timeout.
    #[error("PostgREST request to `{path}` timed out")]
    Timeout { path: String },
    /// PostgREST refused the request (constraint violation, malformed payload).
    #[error("PostgREST rejected `{path}` with status {status}: {message}")]
    Rejected {
        path: String,
        status: StatusCode,
        message: String,
    },
    /// The API key was refused (401/403).
    #[error("PostgREST refused the credentials for `{path}` with status {status}")]
    Unauthorized { path: String, status: StatusCode },
    /// PostgREST answered with an unexpected status code.
    #[error("unexpected PostgREST response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode PostgREST response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Decoding a JSON value into the expected row failed.
    #[error("failed to deserialize PostgREST value for `{path}`")]
    DeserializeValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// A write that should return the affected row returned nothing.
    #[error("PostgREST returned no row for `{path}`")]
    MissingRow { path: String },
}

impl From<PostgrestError> for StorageError {
    fn from(err: PostgrestError) -> Self {
        match err {
            PostgrestError::Timeout { .. } => StorageError::Timeout,
            PostgrestError::Rejected { message, .. } => StorageError::rejected(message),
            PostgrestError::Unauthorized { status, .. } => {
                StorageError::unauthorized(format!("credentials refused ({status})"))
            }
            PostgrestError::MissingRow { path } => StorageError::not_found(path),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_keeps_store_message() {
        let err: StorageError = PostgrestError::Rejected {
            path: "countdown_settings".into(),
            status: StatusCode::BAD_REQUEST,
            message: "invalid input syntax for type timestamp".into(),
        }
        .into();
        match err {
            StorageError::Rejected { message } => {
                assert_eq!(message, "invalid input syntax for type timestamp")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn timeout_and_missing_rows_map_to_dedicated_variants() {
        let err: StorageError = PostgrestError::Timeout {
            path: "countdown_settings".into(),
        }
        .into();
        assert!(matches!(err, StorageError::Timeout));

        let err: StorageError = PostgrestError::MissingRow {
            path: "countdown_settings?id=eq.1".into(),
        }
        .into();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn refused_credentials_are_not_rejections() {
        let err: StorageError = PostgrestError::Unauthorized {
            path: "countdown_settings".into(),
            status: StatusCode::UNAUTHORIZED,
        }
        .into();
        assert!(matches!(err, StorageError::Unauthorized { .. }));
    }

    #[test]
    fn unexpected_status_is_unavailable() {
        let err: StorageError = PostgrestError::RequestStatus {
            path: "countdown_settings".into(),
            status: StatusCode::BAD_GATEWAY,
        }
        .into();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }
}
