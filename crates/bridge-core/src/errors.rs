//! Error types for bridge lifecycle management

use thiserror::Error;

/// Result type for bridge-core operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while managing bridges and channels
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The referenced session (bridge) is not tracked
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A signaling-bus operation failed
    #[error("Signaling operation '{operation}' failed: {message}")]
    Signaling { operation: String, message: String },

    /// A signaling-bus operation did not complete in time
    #[error("Operation '{operation}' timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    /// The caller supplied arguments the manager cannot act on
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl BridgeError {
    /// Create a session-not-found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a signaling error for the named operation
    pub fn signaling(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Signaling {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for the not-found category
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    /// True for failures reported by the signaling bus (including timeouts)
    pub fn is_signaling(&self) -> bool {
        matches!(self, Self::Signaling { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = BridgeError::session_not_found("bridge-1");
        assert!(err.is_not_found());
        assert!(!err.is_signaling());
        assert_eq!(err.to_string(), "Session not found: bridge-1");

        let err = BridgeError::signaling("dial", "busy");
        assert!(err.is_signaling());
        assert_eq!(err.to_string(), "Signaling operation 'dial' failed: busy");

        assert!(BridgeError::timeout("dial", 30).is_signaling());
    }
}
