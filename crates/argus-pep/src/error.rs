//! Error types for the policy enforcement point.

use thiserror::Error;

/// Result type for PEP operations.
pub type PepResult<T> = Result<T, PepError>;

/// HTTP statuses that classify a PDP failure as transient.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors that can occur during authorization.
///
/// Errors are `Clone` so that a single PDP failure can be reported at every
/// index of a multi-request call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PepError {
    /// The library was used before a successful `configure`.
    #[error("PEP is not initialized: call configure first")]
    NotInitialized,

    /// The token provider could not produce a bearer token.
    #[error("failed to acquire access token: {0}")]
    TokenAcquisition(String),

    /// The PDP call failed at the transport or HTTP layer.
    ///
    /// `status` is `None` for transport failures such as timeouts and
    /// connection errors.
    #[error("PDP API error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The PDP answered with something that could not be interpreted.
    #[error("internal error: {0}")]
    Internal(String),

    /// Caller supplied input that cannot be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PepError {
    /// Create an API error carrying an HTTP status.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create an API error for a transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status of an API error.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this error may succeed on retry and may fall back to an
    /// expired cache entry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status: None, .. } => true,
            Self::Api {
                status: Some(status),
                ..
            } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check whether an HTTP status is retry-eligible.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = PepError::api(403, "forbidden");
        assert_eq!(err.to_string(), "PDP API error (status 403): forbidden");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_transport_error_display() {
        let err = PepError::transport("connection reset");
        assert_eq!(err.to_string(), "PDP API error: connection reset");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_transient_classification() {
        assert!(PepError::transport("timeout").is_transient());
        assert!(PepError::api(429, "slow down").is_transient());
        assert!(PepError::api(503, "unavailable").is_transient());
        assert!(!PepError::api(400, "bad request").is_transient());
        assert!(!PepError::api(501, "not implemented").is_transient());
        assert!(!PepError::NotInitialized.is_transient());
        assert!(!PepError::internal("bad json").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = PepError::invalid_input("empty token");
        assert_eq!(err.to_string(), "invalid input: empty token");
        assert!(PepError::NotInitialized.to_string().contains("configure"));
    }
}
