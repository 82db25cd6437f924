//! ARI resource and event payloads
//!
//! Only the fields the bridge manager reads are modeled; everything else in
//! Asterisk's JSON is ignored.

use serde::Deserialize;

/// `Bridge` resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bridge {
    pub id: String,
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub bridge_type: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// `Channel` resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

/// Events delivered on the ARI WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum AriEvent {
    ChannelEnteredBridge { bridge: Bridge, channel: Channel },
    ChannelLeftBridge { bridge: Bridge, channel: Channel },
    BridgeDestroyed { bridge: Bridge },
    #[serde(other)]
    Other,
}
