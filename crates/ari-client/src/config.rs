//! ARI connection settings

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AriError, Result};

/// Connection settings for one Stasis application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AriConfig {
    /// REST base URL, e.g. `http://localhost:8088/ari`
    pub url: String,
    /// Event socket URL, e.g. `ws://localhost:8088/ari/events`
    pub websocket_url: String,
    /// Stasis application name
    pub application: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Timeout for ordinary REST requests, in seconds
    pub request_timeout_secs: u64,
    /// Backoff for re-opening a dropped event socket
    pub reconnect: ReconnectConfig,
}

/// Exponential backoff between event socket reconnection attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Attempts before giving up on the socket (unset = never give up)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Whether another attempt is allowed after `attempts` failures
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 || self.max_delay_ms < self.initial_delay_ms {
            return Err(AriError::config(
                "reconnect delays must be non-zero with max_delay_ms >= initial_delay_ms",
            ));
        }
        if self.multiplier < 1.0 {
            return Err(AriError::config("reconnect multiplier must be at least 1.0"));
        }
        Ok(())
    }
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8088/ari".to_string(),
            websocket_url: "ws://localhost:8088/ari/events".to_string(),
            application: "ARI".to_string(),
            username: "asterisk".to_string(),
            password: String::new(),
            request_timeout_secs: 10,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl AriConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed REST base URL
    pub fn rest_base(&self) -> Result<Url> {
        let url = Url::parse(self.url.trim_end_matches('/'))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(AriError::config(format!("unsupported REST scheme '{}'", scheme))),
        }
    }

    /// Event socket URL with the application and credentials in the query
    pub fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.websocket_url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            scheme => {
                return Err(AriError::config(format!(
                    "unsupported WebSocket scheme '{}'",
                    scheme
                )));
            }
        }
        url.query_pairs_mut()
            .append_pair("app", &self.application)
            .append_pair("api_key", &format!("{}:{}", self.username, self.password));
        Ok(url)
    }

    pub fn validate(&self) -> Result<()> {
        self.rest_base()?;
        self.events_url()?;
        if self.application.is_empty() {
            return Err(AriError::config("application name must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(AriError::config("request_timeout_secs must be greater than zero"));
        }
        self.reconnect.validate()
    }
}
