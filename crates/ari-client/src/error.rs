//! Error types for the ARI client

use rvoip_bridge_core::BridgeError;
use thiserror::Error;

/// Result type for ARI operations
pub type Result<T> = std::result::Result<T, AriError>;

/// Errors that can occur talking to Asterisk
#[derive(Debug, Error)]
pub enum AriError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Asterisk answered with a non-success status
    #[error("Asterisk returned {status}: {body}")]
    Status { status: u16, body: String },

    /// WebSocket failure on the event connection
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A response or event could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid URL in the configuration
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AriError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when Asterisk reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Wrap as a signaling failure of the named bus operation
    pub fn into_bridge_error(self, operation: &str) -> BridgeError {
        match self {
            AriError::Configuration { message } => BridgeError::config(message),
            other => BridgeError::signaling(operation, other.to_string()),
        }
    }
}
