//! Bridge lifecycle events
//!
//! Observers (the CLI, tests) subscribe to a broadcast of lifecycle changes.
//! Publishing never blocks and never fails the operation that triggered it.

use tokio::sync::broadcast;

use crate::types::{BridgeId, ChannelId, Classification, EndpointAddress};

/// Events that can occur on a managed bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A session was created and its monitor started
    SessionCreated {
        bridge_id: BridgeId,
        classification: Classification,
    },
    /// A participant joined a bridge
    ParticipantJoined {
        bridge_id: BridgeId,
        channel_id: ChannelId,
        endpoint: EndpointAddress,
        active_count: usize,
        classification: Classification,
    },
    /// A participant left a bridge
    ParticipantLeft {
        bridge_id: BridgeId,
        channel_id: ChannelId,
        active_count: usize,
    },
    /// The session was torn down and its bridge deleted
    SessionTornDown { bridge_id: BridgeId },
}

impl BridgeEvent {
    pub fn bridge_id(&self) -> &BridgeId {
        match self {
            BridgeEvent::SessionCreated { bridge_id, .. }
            | BridgeEvent::ParticipantJoined { bridge_id, .. }
            | BridgeEvent::ParticipantLeft { bridge_id, .. }
            | BridgeEvent::SessionTornDown { bridge_id } => bridge_id,
        }
    }
}

/// Fan-out of [`BridgeEvent`]s
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BridgeEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}
