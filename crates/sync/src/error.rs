//! Error types for the sync crate.

use thiserror::Error;

/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// What a failed remote call means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailKind {
    /// Credential missing or rejected; stop calling until the session changes.
    Unauthenticated,
    /// The addressed collection or record does not exist server-side.
    NotFound,
    /// Anything else (network, server, validation); queue and retry.
    RequestFailed,
}

/// Errors from the remote record API.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the record service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Local persistence error while applying a sync result
    #[error("Store error: {0}")]
    Store(#[from] habitsync_store::StoreError),
}

impl SyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify the failure for queueing policy.
    pub fn fail_kind(&self) -> FailKind {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => FailKind::Unauthenticated,
                404 => FailKind::NotFound,
                _ => FailKind::RequestFailed,
            },
            Self::Auth(_) => FailKind::Unauthenticated,
            Self::Http(_) | Self::Json(_) | Self::Store(_) => FailKind::RequestFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_kind_classification() {
        assert_eq!(
            SyncError::api(401, "unauthorized").fail_kind(),
            FailKind::Unauthenticated
        );
        assert_eq!(
            SyncError::api(403, "forbidden").fail_kind(),
            FailKind::Unauthenticated
        );
        assert_eq!(
            SyncError::api(404, "missing collection").fail_kind(),
            FailKind::NotFound
        );
        assert_eq!(
            SyncError::api(500, "boom").fail_kind(),
            FailKind::RequestFailed
        );
        assert_eq!(
            SyncError::auth("no token").fail_kind(),
            FailKind::Unauthenticated
        );
    }
}
