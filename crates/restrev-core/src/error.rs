//! Error types for restrev-core

use thiserror::Error;

/// Result type alias using restrev-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in restrev-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Local storage engine missing or inaccessible
    #[error("Local store unavailable: {0}")]
    StoreUnavailable(String),

    /// Remote gateway failure
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity absent both locally and remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input rejected before reaching the network
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the remote gateway.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether this error came from the local store. Such errors are never
    /// fatal: callers fall back to network-only operation.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::LibSql(_) | Self::StoreUnavailable(_)
        )
    }
}

/// Failure signalled by the remote gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Connection could not be established or was dropped
    #[error("request could not be sent: {0}")]
    Unreachable(String),

    /// Transport-level timeout
    #[error("request timed out")]
    Timeout,

    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Server answered 2xx with a body that is not JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl NetworkError {
    /// Whether a write that failed this way should be queued for replay.
    ///
    /// A decode failure means the server accepted the request, so replaying
    /// it would duplicate the write.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_not_retryable() {
        assert!(!NetworkError::Decode("bad json".into()).is_retryable());
        assert!(NetworkError::Timeout.is_retryable());
        assert!(NetworkError::Unreachable("refused".into()).is_retryable());
        assert!(NetworkError::Status {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
    }

    #[test]
    fn classifies_error_sources() {
        assert!(Error::StoreUnavailable("gone".into()).is_storage());
        assert!(Error::Database("locked".into()).is_storage());
        assert!(!Error::NotFound("no such restaurant".into()).is_storage());
        assert!(Error::Network(NetworkError::Timeout).is_network());
        assert!(!Error::Validation("rating".into()).is_network());
    }
}
