//! In-memory signaling bus
//!
//! A self-contained [`SignalingBus`] that keeps bridges and channels in process
//! memory. It backs the CLI's simulation mode and the integration tests: every
//! call is recorded, individual operations can be made to fail, and remote
//! hangups can be injected to drive departure monitors.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::{BridgeError, Result};
use crate::signaling::{DepartureStream, SignalingBus};
use crate::types::{BridgeId, ChannelId, DepartureEvent, EndpointAddress, SoundRef};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusOperation {
    CreateBridge,
    DeleteBridge,
    CreateChannel,
    DialChannel,
    AddChannel,
    HangupChannel,
    BridgeChannels,
    Subscribe,
    PlaySound,
}

/// A recorded bus call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    CreateBridge(BridgeId),
    DeleteBridge(BridgeId),
    CreateChannel(ChannelId, EndpointAddress),
    DialChannel(ChannelId),
    AddChannel(BridgeId, ChannelId),
    HangupChannel(ChannelId),
    BridgeChannels(BridgeId),
    Subscribe(BridgeId),
    PlaySound(BridgeId, SoundRef),
}

#[derive(Debug, Default)]
struct BusState {
    next_id: u64,
    bridges: HashMap<BridgeId, Vec<ChannelId>>,
    channels: HashMap<ChannelId, EndpointAddress>,
    subscribers: HashMap<BridgeId, mpsc::UnboundedSender<DepartureEvent>>,
    failing_operations: HashSet<BusOperation>,
    failing_endpoints: HashSet<String>,
    calls: Vec<BusCall>,
}

impl BusState {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check(&self, op: BusOperation, name: &str) -> Result<()> {
        if self.failing_operations.contains(&op) {
            Err(BridgeError::signaling(name, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn bridge_of(&self, channel_id: &ChannelId) -> Option<BridgeId> {
        self.bridges
            .iter()
            .find(|(_, members)| members.contains(channel_id))
            .map(|(bridge_id, _)| bridge_id.clone())
    }

    /// Remove a channel from its bridge; returns the departure to deliver
    fn leave_bridge(
        &mut self,
        channel_id: &ChannelId,
    ) -> Option<(mpsc::UnboundedSender<DepartureEvent>, DepartureEvent)> {
        let bridge_id = self.bridge_of(channel_id)?;
        if let Some(members) = self.bridges.get_mut(&bridge_id) {
            members.retain(|c| c != channel_id);
        }
        let sender = self.subscribers.get(&bridge_id)?.clone();
        Some((sender, DepartureEvent::new(bridge_id, channel_id.clone())))
    }
}

/// Signaling bus held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryBus {
    state: Mutex<BusState>,
    dial_delay: Mutex<Option<Duration>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail until [`InMemoryBus::clear_failures`]
    pub fn fail_operation(&self, op: BusOperation) {
        self.state.lock().failing_operations.insert(op);
    }

    /// Make dialing the given address fail (e.g. `PJSIP/mallory`)
    pub fn fail_endpoint(&self, address: &str) {
        self.state.lock().failing_endpoints.insert(address.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failing_operations.clear();
        state.failing_endpoints.clear();
    }

    /// Make every dial ring for `delay` before answering
    pub fn set_dial_delay(&self, delay: Option<Duration>) {
        *self.dial_delay.lock() = delay;
    }

    /// Simulate the far end hanging up: the channel leaves its bridge and the
    /// bridge's subscriber receives a departure.
    pub fn remote_hangup(&self, channel_id: &ChannelId) -> Result<()> {
        let departure = {
            let mut state = self.state.lock();
            if state.channels.remove(channel_id).is_none() {
                return Err(BridgeError::signaling(
                    "remote_hangup",
                    format!("unknown channel {}", channel_id),
                ));
            }
            state.leave_bridge(channel_id)
        };

        if let Some((sender, event)) = departure {
            sender.send(event).map_err(|_| {
                BridgeError::signaling("remote_hangup", "departure subscriber closed")
            })?;
        }
        Ok(())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BusCall> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&BusCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn bridge_exists(&self, bridge_id: &BridgeId) -> bool {
        self.state.lock().bridges.contains_key(bridge_id)
    }

    pub fn bridge_count(&self) -> usize {
        self.state.lock().bridges.len()
    }

    /// Channels that have not been hung up
    pub fn live_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.state.lock().channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Channel created for the given address, if still live
    pub fn channel_for(&self, address: &str) -> Option<ChannelId> {
        self.state
            .lock()
            .channels
            .iter()
            .find(|(_, endpoint)| endpoint.as_str() == address)
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl SignalingBus for InMemoryBus {
    async fn create_bridge(&self, bridge_type: &str) -> Result<BridgeId> {
        let mut state = self.state.lock();
        state.check(BusOperation::CreateBridge, "create_bridge")?;
        let bridge_id = BridgeId::new(state.allocate(bridge_type));
        state.bridges.insert(bridge_id.clone(), Vec::new());
        state.calls.push(BusCall::CreateBridge(bridge_id.clone()));
        Ok(bridge_id)
    }

    async fn delete_bridge(&self, bridge_id: &BridgeId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BusCall::DeleteBridge(bridge_id.clone()));
        state.check(BusOperation::DeleteBridge, "delete_bridge")?;
        state.subscribers.remove(bridge_id);
        state
            .bridges
            .remove(bridge_id)
            .map(|_| ())
            .ok_or_else(|| {
                BridgeError::signaling("delete_bridge", format!("unknown bridge {}", bridge_id))
            })
    }

    async fn create_channel(&self, endpoint: &EndpointAddress) -> Result<ChannelId> {
        let mut state = self.state.lock();
        state.check(BusOperation::CreateChannel, "create_channel")?;
        let channel_id = ChannelId::new(state.allocate("channel"));
        state.channels.insert(channel_id.clone(), endpoint.clone());
        state
            .calls
            .push(BusCall::CreateChannel(channel_id.clone(), endpoint.clone()));
        Ok(channel_id)
    }

    async fn dial_channel(
        &self,
        channel_id: &ChannelId,
        _caller: &str,
        timeout: Duration,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.calls.push(BusCall::DialChannel(channel_id.clone()));
            state.check(BusOperation::DialChannel, "dial_channel")?;
            let endpoint = state.channels.get(channel_id).ok_or_else(|| {
                BridgeError::signaling("dial_channel", format!("unknown channel {}", channel_id))
            })?;
            if state.failing_endpoints.contains(endpoint.as_str()) {
                return Err(BridgeError::signaling(
                    "dial_channel",
                    format!("{} did not answer", endpoint),
                ));
            }
        }

        let delay = *self.dial_delay.lock();
        if let Some(delay) = delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(BridgeError::timeout("dial_channel", timeout.as_secs()));
            }
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn add_channel_to_bridge(
        &self,
        bridge_id: &BridgeId,
        channel_id: &ChannelId,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(BusCall::AddChannel(bridge_id.clone(), channel_id.clone()));
        state.check(BusOperation::AddChannel, "add_channel_to_bridge")?;
        if !state.channels.contains_key(channel_id) {
            return Err(BridgeError::signaling(
                "add_channel_to_bridge",
                format!("unknown channel {}", channel_id),
            ));
        }
        let members = state.bridges.get_mut(bridge_id).ok_or_else(|| {
            BridgeError::signaling("add_channel_to_bridge", format!("unknown bridge {}", bridge_id))
        })?;
        if !members.contains(channel_id) {
            members.push(channel_id.clone());
        }
        Ok(())
    }

    async fn hangup_channel(&self, channel_id: &ChannelId) -> Result<()> {
        let departure = {
            let mut state = self.state.lock();
            state.calls.push(BusCall::HangupChannel(channel_id.clone()));
            state.check(BusOperation::HangupChannel, "hangup_channel")?;
            if state.channels.remove(channel_id).is_none() {
                return Err(BridgeError::signaling(
                    "hangup_channel",
                    format!("unknown channel {}", channel_id),
                ));
            }
            state.leave_bridge(channel_id)
        };

        // Hanging up a bridged channel produces a departure, as on a real server
        if let Some((sender, event)) = departure {
            if sender.send(event).is_err() {
                tracing::debug!("Departure subscriber for {} is gone", channel_id);
            }
        }
        Ok(())
    }

    async fn bridge_channel_ids(&self, bridge_id: &BridgeId) -> Result<Vec<ChannelId>> {
        let mut state = self.state.lock();
        state.calls.push(BusCall::BridgeChannels(bridge_id.clone()));
        state.check(BusOperation::BridgeChannels, "bridge_channel_ids")?;
        state
            .bridges
            .get(bridge_id)
            .cloned()
            .ok_or_else(|| {
                let message = format!("unknown bridge {}", bridge_id);
                BridgeError::signaling("bridge_channel_ids", message)
            })
    }

    async fn subscribe_departures(&self, bridge_id: &BridgeId) -> Result<DepartureStream> {
        let mut state = self.state.lock();
        state.calls.push(BusCall::Subscribe(bridge_id.clone()));
        state.check(BusOperation::Subscribe, "subscribe_departures")?;
        if !state.bridges.contains_key(bridge_id) {
            return Err(BridgeError::signaling(
                "subscribe_departures",
                format!("unknown bridge {}", bridge_id),
            ));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.insert(bridge_id.clone(), tx);
        Ok(rx)
    }

    async fn play_sound(&self, bridge_id: &BridgeId, sound: &SoundRef) -> Result<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(BusCall::PlaySound(bridge_id.clone(), sound.clone()));
        state.check(BusOperation::PlaySound, "play_sound")?;
        if state.bridges.contains_key(bridge_id) {
            Ok(())
        } else {
            Err(BridgeError::signaling("play_sound", format!("unknown bridge {}", bridge_id)))
        }
    }
}
