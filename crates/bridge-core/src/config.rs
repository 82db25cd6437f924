//! Bridge manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, Result};
use crate::types::SoundRef;

/// Tunables for the bridge lifecycle manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a dial may ring before it is abandoned, in seconds
    pub dial_timeout_secs: u64,
    /// Technology prefix applied to bare endpoint names
    pub endpoint_technology: String,
    /// Bridge type requested from the signaling bus
    pub bridge_type: String,
    /// Caller identity presented when dialing
    pub caller_id: String,
    /// Played on the bridge when a participant joins
    pub join_sound: String,
    /// Played on the bridge when a participant leaves
    pub leave_sound: String,
    /// Capacity of the lifecycle event broadcast channel
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: 30,
            endpoint_technology: "PJSIP".to_string(),
            bridge_type: "mixing".to_string(),
            caller_id: "ARI".to_string(),
            join_sound: "sound:confbridge-join".to_string(),
            leave_sound: "sound:confbridge-leave".to_string(),
            event_capacity: 256,
        }
    }
}

impl BridgeConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn join_sound(&self) -> SoundRef {
        SoundRef::new(self.join_sound.clone())
    }

    pub fn leave_sound(&self) -> SoundRef {
        SoundRef::new(self.leave_sound.clone())
    }

    /// Set the dial timeout
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the technology prefix for bare endpoint names
    pub fn with_endpoint_technology(mut self, technology: impl Into<String>) -> Self {
        self.endpoint_technology = technology.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dial_timeout_secs == 0 {
            return Err(BridgeError::config("dial_timeout_secs must be greater than zero"));
        }
        if self.endpoint_technology.is_empty() || self.endpoint_technology.contains('/') {
            return Err(BridgeError::config(format!(
                "invalid endpoint technology '{}'",
                self.endpoint_technology
            )));
        }
        if self.bridge_type.is_empty() {
            return Err(BridgeError::config("bridge_type must not be empty"));
        }
        if self.event_capacity == 0 {
            return Err(BridgeError::config("event_capacity must be greater than zero"));
        }
        Ok(())
    }
}
