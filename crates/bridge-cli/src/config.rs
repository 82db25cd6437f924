//! Console configuration
//!
//! Settings come from an optional TOML file (`confbridge.toml` in the working
//! directory unless `--config` names another one), then command-line flags and
//! their environment variables override individual values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rvoip_ari_client::{AriConfig, AriError};
use rvoip_bridge_core::{BridgeConfig, BridgeError};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "confbridge.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Failed to install logger: {0}")]
    Logging(String),

    #[error(transparent)]
    Ari(#[from] AriError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
    pub spans: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            spans: false,
        }
    }
}

/// Everything the console needs to start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ari: AriConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingSection,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ari_url: Option<String>,
    pub websocket_url: Option<String>,
    pub application: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub dial_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl AppConfig {
    /// Load `path`, or `confbridge.toml` if present, or the defaults.
    ///
    /// An explicitly named file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply flag/environment overrides on top of the file values
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.ari_url {
            self.ari.url = url;
        }
        if let Some(url) = overrides.websocket_url {
            self.ari.websocket_url = url;
        }
        if let Some(application) = overrides.application {
            self.ari.application = application;
        }
        if let Some(username) = overrides.username {
            self.ari.username = username;
        }
        if let Some(password) = overrides.password {
            self.ari.password = password;
        }
        if let Some(secs) = overrides.dial_timeout_secs {
            self.bridge.dial_timeout_secs = secs;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.json_logs {
            self.logging.json = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ari.validate()?;
        self.bridge.validate()?;
        crate::logging::parse_log_level(&self.logging.level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [ari]
            url = "http://pbx.example.com:8088/ari"
            websocket_url = "ws://pbx.example.com:8088/ari/events"
            password = "secret"

            [bridge]
            dial_timeout_secs = 45
            join_sound = "sound:beep"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.ari.url, "http://pbx.example.com:8088/ari");
        assert_eq!(config.ari.password, "secret");
        assert_eq!(config.ari.application, "ARI");
        assert_eq!(config.bridge.dial_timeout_secs, 45);
        assert_eq!(config.bridge.join_sound, "sound:beep");
        assert_eq!(config.bridge.leave_sound, "sound:confbridge-leave");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply(Overrides {
            ari_url: Some("http://10.0.0.5:8088/ari".to_string()),
            application: Some("confbridge".to_string()),
            password: Some("hunter2".to_string()),
            log_level: Some("warn".to_string()),
            json_logs: true,
            ..Default::default()
        });

        assert_eq!(config.ari.url, "http://10.0.0.5:8088/ari");
        assert_eq!(config.ari.websocket_url, "ws://localhost:8088/ari/events");
        assert_eq!(config.ari.application, "confbridge");
        assert_eq!(config.ari.password, "hunter2");
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));

        let mut config = AppConfig::default();
        config.ari.url = "ftp://localhost/ari".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Ari(_))));

        assert!(matches!(
            AppConfig::from_toml_str("[bridge]\ndial_timeout_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_named_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/confbridge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
