//! Signaling-bus collaborator interface
//!
//! The lifecycle manager never talks to the call-control server directly. Every
//! bridge and channel operation goes through a [`SignalingBus`], which lets the
//! ARI client, the in-memory bus and test doubles share one manager.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{BridgeId, ChannelId, DepartureEvent, EndpointAddress, SoundRef};

/// Stream of departure notifications for one bridge, in bus emission order.
///
/// Unbounded: a bus delivering events for many bridges never waits on one
/// slow monitor and never drops a departure.
pub type DepartureStream = mpsc::UnboundedReceiver<DepartureEvent>;

/// Operations the lifecycle manager needs from the call-control server
#[async_trait]
pub trait SignalingBus: Send + Sync + 'static {
    /// Create a mixing bridge of the given type
    async fn create_bridge(&self, bridge_type: &str) -> Result<BridgeId>;

    /// Delete a bridge
    async fn delete_bridge(&self, bridge_id: &BridgeId) -> Result<()>;

    /// Create (but do not dial) a channel towards an endpoint
    async fn create_channel(&self, endpoint: &EndpointAddress) -> Result<ChannelId>;

    /// Dial a created channel, giving up after `timeout`
    async fn dial_channel(
        &self,
        channel_id: &ChannelId,
        caller: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Add a dialed channel to a bridge
    async fn add_channel_to_bridge(
        &self,
        bridge_id: &BridgeId,
        channel_id: &ChannelId,
    ) -> Result<()>;

    /// Hang up a channel
    async fn hangup_channel(&self, channel_id: &ChannelId) -> Result<()>;

    /// Channels the server currently reports inside a bridge
    async fn bridge_channel_ids(&self, bridge_id: &BridgeId) -> Result<Vec<ChannelId>>;

    /// Subscribe to channel departures for one bridge
    async fn subscribe_departures(&self, bridge_id: &BridgeId) -> Result<DepartureStream>;

    /// Play a sound on a bridge
    async fn play_sound(&self, bridge_id: &BridgeId, sound: &SoundRef) -> Result<()>;
}
