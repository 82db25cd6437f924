//! Core identifiers and value types
//!
//! Bridge and channel identifiers are opaque strings assigned by the signaling
//! bus. They are wrapped in newtypes so a bridge id can never be passed where a
//! channel id is expected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a mixing bridge (one per session)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BridgeId(pub String);

impl BridgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BridgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one telephony leg
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A dialable address, always carrying its technology prefix (`PJSIP/alice`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointAddress(String);

impl EndpointAddress {
    /// Qualify operator input with `technology` unless it already names one.
    ///
    /// `alice` becomes `PJSIP/alice`; `SIP/trunk/5551234` is kept as is.
    pub fn qualify(raw: &str, technology: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('/') {
            Self(raw.to_string())
        } else {
            Self(format!("{}/{}", technology, raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session classification.
///
/// Only ever moves from `Call` to `Conference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Two-party session, torn down on the first departure
    Call,
    /// Multi-party session, survives while a participant remains
    Conference,
}

impl Classification {
    /// Classification for a session dialed with `participants` addresses
    pub fn for_participants(participants: usize) -> Self {
        if participants <= 2 {
            Classification::Call
        } else {
            Classification::Conference
        }
    }

    /// Classification after the active count reached `active_count`
    pub fn promote(self, active_count: usize) -> Self {
        match self {
            Classification::Conference => Classification::Conference,
            Classification::Call if active_count > 2 => Classification::Conference,
            Classification::Call => Classification::Call,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Call => "call",
            Classification::Conference => "conference",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media reference for bridge playback (`sound:confbridge-join`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundRef(pub String);

impl SoundRef {
    pub fn new(media: impl Into<String>) -> Self {
        Self(media.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel left a bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureEvent {
    pub bridge_id: BridgeId,
    pub channel_id: ChannelId,
}

impl DepartureEvent {
    pub fn new(bridge_id: BridgeId, channel_id: ChannelId) -> Self {
        Self {
            bridge_id,
            channel_id,
        }
    }
}

/// One attached participant as seen by readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantInfo {
    pub channel_id: ChannelId,
    pub endpoint: EndpointAddress,
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub bridge_id: BridgeId,
    pub classification: Classification,
    pub active_count: usize,
    pub participants: Vec<ParticipantInfo>,
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Endpoint addresses of every attached participant
    pub fn endpoints(&self) -> Vec<EndpointAddress> {
        self.participants.iter().map(|p| p.endpoint.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_from_participants() {
        assert_eq!(Classification::for_participants(2), Classification::Call);
        assert_eq!(Classification::for_participants(3), Classification::Conference);
        assert_eq!(Classification::for_participants(10), Classification::Conference);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let call = Classification::Call;
        assert_eq!(call.promote(2), Classification::Call);
        assert_eq!(call.promote(3), Classification::Conference);

        let conference = Classification::Conference;
        assert_eq!(conference.promote(0), Classification::Conference);
        assert_eq!(conference.promote(1), Classification::Conference);
    }

    #[test]
    fn test_endpoint_qualification() {
        let addr = EndpointAddress::qualify("alice", "PJSIP");
        assert_eq!(addr.as_str(), "PJSIP/alice");

        let addr = EndpointAddress::qualify("SIP/trunk/5551234", "PJSIP");
        assert_eq!(addr.as_str(), "SIP/trunk/5551234");
    }

    #[test]
    fn test_classification_serializes_lowercase() {
        let json = serde_json::to_string(&Classification::Conference).unwrap();
        assert_eq!(json, "\"conference\"");
    }
}
