//! Routes ARI events to per-bridge departure subscribers
//!
//! The router also remembers which channels it has seen enter each subscribed
//! bridge, so departures missed while the event socket was down can be
//! replayed once the bridge's current membership is known again.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;

use rvoip_bridge_core::{BridgeId, ChannelId, DepartureEvent, DepartureStream};

use crate::models::AriEvent;

#[derive(Debug)]
struct Subscription {
    sender: mpsc::UnboundedSender<DepartureEvent>,
    channels: HashSet<ChannelId>,
}

/// Fans `ChannelLeftBridge` events out to the monitor bound to each bridge
#[derive(Debug, Default)]
pub struct EventRouter {
    subscribers: DashMap<BridgeId, Subscription>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the subscriber for a bridge
    pub fn subscribe(&self, bridge_id: &BridgeId) -> DepartureStream {
        let (sender, rx) = mpsc::unbounded_channel();
        let subscription = Subscription {
            sender,
            channels: HashSet::new(),
        };
        if self.subscribers.insert(bridge_id.clone(), subscription).is_some() {
            tracing::debug!("Replaced departure subscriber for bridge {}", bridge_id);
        }
        rx
    }

    /// Drop the subscriber for a bridge, closing its stream
    pub fn unsubscribe(&self, bridge_id: &BridgeId) -> bool {
        self.subscribers.remove(bridge_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drop every subscriber
    pub fn close_all(&self) {
        self.subscribers.clear();
    }

    /// Remember that a channel is in a subscribed bridge
    pub fn track(&self, bridge_id: &BridgeId, channel_id: &ChannelId) {
        if let Some(mut subscription) = self.subscribers.get_mut(bridge_id) {
            subscription.channels.insert(channel_id.clone());
        }
    }

    /// Subscribed bridges, sorted
    pub fn bridges(&self) -> Vec<BridgeId> {
        let mut bridges: Vec<_> = self.subscribers.iter().map(|e| e.key().clone()).collect();
        bridges.sort();
        bridges
    }

    /// Deliver one event. Returns `true` if it changed a subscription.
    pub fn dispatch(&self, event: AriEvent) -> bool {
        match event {
            AriEvent::ChannelEnteredBridge { bridge, channel } => {
                let bridge_id = BridgeId::new(bridge.id);
                let known = self.subscribers.contains_key(&bridge_id);
                self.track(&bridge_id, &ChannelId::new(channel.id));
                known
            }
            AriEvent::ChannelLeftBridge { bridge, channel } => {
                self.depart(&BridgeId::new(bridge.id), ChannelId::new(channel.id))
            }
            AriEvent::BridgeDestroyed { bridge } => {
                let bridge_id = BridgeId::new(bridge.id);
                let known = self.unsubscribe(&bridge_id);
                if known {
                    tracing::info!("Bridge {} destroyed on the server", bridge_id);
                }
                known
            }
            AriEvent::Other => false,
        }
    }

    /// Replay a departure for every tracked channel no longer in `present`.
    /// Returns the number of departures delivered.
    pub fn reconcile(&self, bridge_id: &BridgeId, present: &[ChannelId]) -> usize {
        let missing: Vec<ChannelId> = match self.subscribers.get(bridge_id) {
            Some(subscription) => subscription
                .channels
                .iter()
                .filter(|channel_id| !present.contains(channel_id))
                .cloned()
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for channel_id in missing {
            tracing::info!(
                "Channel {} left bridge {} while events were down",
                channel_id,
                bridge_id
            );
            if self.depart(bridge_id, channel_id) {
                delivered += 1;
            }
        }
        delivered
    }

    fn depart(&self, bridge_id: &BridgeId, channel_id: ChannelId) -> bool {
        let Some(mut subscription) = self.subscribers.get_mut(bridge_id) else {
            tracing::debug!("No subscriber for departure from bridge {}", bridge_id);
            return false;
        };
        subscription.channels.remove(&channel_id);

        let departure = DepartureEvent::new(bridge_id.clone(), channel_id);
        if subscription.sender.send(departure).is_err() {
            drop(subscription);
            tracing::debug!("Departure subscriber for bridge {} is gone, pruning", bridge_id);
            self.subscribers.remove(bridge_id);
            return false;
        }
        true
    }
}
