//! Bridge Lifecycle Manager
//!
//! Creates bridges, attaches endpoints to them, promotes their classification
//! and tears them down. Each session gets a [`DepartureMonitor`] task that feeds
//! departures back into [`BridgeLifecycleManager::handle_departure`].
//!
//! # Locking
//!
//! Every read-modify-write of a session (attach, departure, teardown) runs with
//! the session's lock held. Dialing, which may ring for the full dial timeout,
//! runs outside it; adding the answered channel to the bridge and counting it
//! runs inside it, so a departure can never be processed between the two.
//! Teardown marks the record closed and unregisters it before any hangup is
//! issued, so only one teardown ever runs per session.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::BridgeConfig;
use crate::errors::{BridgeError, Result};
use crate::events::{BridgeEvent, EventPublisher};
use crate::monitor::DepartureMonitor;
use crate::registry::{EndpointDirectory, RegistryStats, SessionRecord, SessionRegistry};
use crate::signaling::{DepartureStream, SignalingBus};
use crate::types::{
    BridgeId, ChannelId, Classification, DepartureEvent, EndpointAddress, ParticipantInfo,
    SessionSnapshot, SoundRef,
};

/// Result of a create or join: who made it in and who did not
#[derive(Debug, Clone, Default)]
pub struct AttachReport {
    pub joined: Vec<ParticipantInfo>,
    pub failed: Vec<(EndpointAddress, String)>,
}

impl AttachReport {
    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    pub fn all_joined(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A newly created session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub bridge_id: BridgeId,
    pub classification: Classification,
    pub report: AttachReport,
}

/// What a departure did to its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureOutcome {
    /// The session survives with this many participants
    Remaining(usize),
    /// The departure ended the session
    TornDown,
    /// The channel was not attached to the session; nothing changed
    Untracked,
    /// The session no longer exists
    SessionGone,
}

/// Owns the session registry, the endpoint directory and the monitors
pub struct BridgeLifecycleManager {
    bus: Arc<dyn SignalingBus>,
    config: BridgeConfig,
    sessions: SessionRegistry,
    endpoints: EndpointDirectory,
    monitors: DashMap<BridgeId, JoinHandle<()>>,
    events: EventPublisher,
}

impl BridgeLifecycleManager {
    pub fn new(bus: Arc<dyn SignalingBus>, config: BridgeConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let events = EventPublisher::new(config.event_capacity);
        Ok(Arc::new(Self {
            bus,
            config,
            sessions: SessionRegistry::new(),
            endpoints: EndpointDirectory::new(),
            monitors: DashMap::new(),
            events,
        }))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn endpoints(&self) -> &EndpointDirectory {
        &self.endpoints
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> RegistryStats {
        self.sessions.stats()
    }

    /// Number of departure monitors still running
    pub fn active_monitors(&self) -> usize {
        self.monitors.iter().filter(|entry| !entry.value().is_finished()).count()
    }

    /// Create a bridge, attach every address and start its departure monitor.
    ///
    /// Two addresses make a call, three or more a conference. If the bridge
    /// cannot be created nothing is registered.
    pub async fn create_session<S: AsRef<str>>(
        self: &Arc<Self>,
        addresses: &[S],
    ) -> Result<SessionHandle> {
        if addresses.len() < 2 {
            return Err(BridgeError::invalid_request(format!(
                "a session needs at least two endpoints, got {}",
                addresses.len()
            )));
        }

        let classification = Classification::for_participants(addresses.len());
        let bridge_id = self.bus.create_bridge(&self.config.bridge_type).await.map_err(|e| {
            tracing::error!("Failed to create bridge for provided endpoints: {}", e);
            e
        })?;

        // Subscribe before anyone joins so no departure is missed
        let departures = match self.bus.subscribe_departures(&bridge_id).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to subscribe to departures on bridge {}: {}", bridge_id, e);
                if let Err(e) = self.bus.delete_bridge(&bridge_id).await {
                    tracing::warn!("Failed to delete unmonitored bridge {}: {}", bridge_id, e);
                }
                return Err(e);
            }
        };

        self.sessions.register(bridge_id.clone(), classification);
        tracing::info!("Bridge created: {}, type: {}", bridge_id, classification);
        self.events.publish(BridgeEvent::SessionCreated {
            bridge_id: bridge_id.clone(),
            classification,
        });

        let report = self.attach_endpoints(&bridge_id, addresses).await;
        self.spawn_monitor(bridge_id.clone(), departures);

        if report.joined.is_empty() {
            tracing::warn!("No endpoint joined bridge {}, tearing it down", bridge_id);
            self.teardown_session(&bridge_id).await;
        }

        let classification = match self.sessions.get(&bridge_id) {
            Some(session) => session.lock().await.classification(),
            None => classification,
        };

        Ok(SessionHandle {
            bridge_id,
            classification,
            report,
        })
    }

    /// Dial one endpoint and add it to the bridge.
    ///
    /// A failed dial leaves every registry untouched. A channel that answered
    /// but could not be added to the bridge is abandoned as is.
    pub async fn attach_endpoint(
        &self,
        bridge_id: &BridgeId,
        address: &str,
    ) -> Result<ParticipantInfo> {
        let session = self
            .sessions
            .get(bridge_id)
            .ok_or_else(|| BridgeError::session_not_found(bridge_id.as_str()))?;
        let endpoint = EndpointAddress::qualify(address, &self.config.endpoint_technology);

        let channel_id = self.bus.create_channel(&endpoint).await.map_err(|e| {
            tracing::error!("Failed to create channel for {}: {}", endpoint, e);
            e
        })?;
        tracing::info!("Channel {} created for {}", channel_id, endpoint);

        let timeout = self.config.dial_timeout();
        let dialed = tokio::time::timeout(
            timeout,
            self.bus.dial_channel(&channel_id, &self.config.caller_id, timeout),
        )
        .await
        .unwrap_or_else(|_| Err(BridgeError::timeout("dial_channel", timeout.as_secs())));
        if let Err(e) = dialed {
            tracing::error!("Dial to {} has failed: {}", endpoint, e);
            return Err(e);
        }

        let (active_count, classification) = {
            let mut record = session.lock().await;
            if record.is_closed() {
                drop(record);
                tracing::warn!("Bridge {} was torn down while dialing {}", bridge_id, endpoint);
                if let Err(e) = self.bus.hangup_channel(&channel_id).await {
                    tracing::error!("Unable to hang up channel {}: {}", channel_id, e);
                }
                return Err(BridgeError::session_not_found(bridge_id.as_str()));
            }

            if let Err(e) = self.bus.add_channel_to_bridge(bridge_id, &channel_id).await {
                tracing::error!(
                    "Adding channel {} to bridge {} failed: {}",
                    channel_id,
                    bridge_id,
                    e
                );
                return Err(e);
            }

            let before = record.classification();
            let active_count = record.attach(channel_id.clone());
            self.endpoints.insert(channel_id.clone(), endpoint.clone());
            if before != record.classification() {
                tracing::info!("Bridge {} promoted to {}", bridge_id, record.classification());
            }
            (active_count, record.classification())
        };

        self.play_best_effort(bridge_id, &self.config.join_sound()).await;
        self.events.publish(BridgeEvent::ParticipantJoined {
            bridge_id: bridge_id.clone(),
            channel_id: channel_id.clone(),
            endpoint: endpoint.clone(),
            active_count,
            classification,
        });

        Ok(ParticipantInfo { channel_id, endpoint })
    }

    /// Attach each address in turn; failures do not stop the rest
    pub async fn attach_endpoints<S: AsRef<str>>(
        &self,
        bridge_id: &BridgeId,
        addresses: &[S],
    ) -> AttachReport {
        let mut report = AttachReport::default();
        for address in addresses {
            let address = address.as_ref();
            match self.attach_endpoint(bridge_id, address).await {
                Ok(participant) => report.joined.push(participant),
                Err(e) => {
                    let endpoint =
                        EndpointAddress::qualify(address, &self.config.endpoint_technology);
                    report.failed.push((endpoint, e.to_string()));
                }
            }
        }
        report
    }

    /// Attach addresses to a session that already exists
    pub async fn join_existing_session<S: AsRef<str>>(
        &self,
        bridge_id: &BridgeId,
        addresses: &[S],
    ) -> Result<AttachReport> {
        if !self.sessions.contains(bridge_id) {
            tracing::error!("Call {} is not available", bridge_id);
            return Err(BridgeError::session_not_found(bridge_id.as_str()));
        }
        Ok(self.attach_endpoints(bridge_id, addresses).await)
    }

    /// Hang up every channel, delete the bridge and forget the session.
    ///
    /// Returns `false` when the session was already gone.
    pub async fn teardown_session(&self, bridge_id: &BridgeId) -> bool {
        let Some(session) = self.sessions.get(bridge_id) else {
            tracing::debug!("Teardown of unknown bridge {} ignored", bridge_id);
            return false;
        };

        let remaining = {
            let mut record = session.lock().await;
            if record.is_closed() {
                return false;
            }
            self.claim_for_teardown(&mut record)
        };

        self.release_bridge(bridge_id, remaining).await;
        true
    }

    /// Apply one departure: decrement, then tear down a call or an empty
    /// conference.
    pub async fn handle_departure(&self, event: &DepartureEvent) -> DepartureOutcome {
        let bridge_id = &event.bridge_id;
        self.play_best_effort(bridge_id, &self.config.leave_sound()).await;

        let Some(session) = self.sessions.get(bridge_id) else {
            return DepartureOutcome::SessionGone;
        };

        let mut record = session.lock().await;
        if record.is_closed() {
            return DepartureOutcome::SessionGone;
        }

        let Some(active_count) = record.detach(&event.channel_id) else {
            tracing::warn!(
                "Channel {} left bridge {} but was not attached to it",
                event.channel_id,
                bridge_id
            );
            return DepartureOutcome::Untracked;
        };
        self.endpoints.remove(&event.channel_id);
        tracing::info!(
            "Channel {} left bridge {} ({} remaining)",
            event.channel_id,
            bridge_id,
            active_count
        );
        self.events.publish(BridgeEvent::ParticipantLeft {
            bridge_id: bridge_id.clone(),
            channel_id: event.channel_id.clone(),
            active_count,
        });

        if !record.should_teardown() {
            return DepartureOutcome::Remaining(active_count);
        }

        let remaining = self.claim_for_teardown(&mut record);
        drop(record);
        self.release_bridge(bridge_id, remaining).await;
        DepartureOutcome::TornDown
    }

    /// Snapshot of every live session, sorted by bridge id
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let mut snapshots = Vec::new();
        for (_, session) in self.sessions.handles() {
            let record = session.lock().await;
            if !record.is_closed() {
                snapshots.push(self.snapshot(&record));
            }
        }
        snapshots
    }

    /// Snapshot of one session
    pub async fn session(&self, bridge_id: &BridgeId) -> Option<SessionSnapshot> {
        let session = self.sessions.get(bridge_id)?;
        let record = session.lock().await;
        (!record.is_closed()).then(|| self.snapshot(&record))
    }

    fn snapshot(&self, record: &SessionRecord) -> SessionSnapshot {
        let participants = record
            .attached()
            .iter()
            .filter_map(|channel_id| {
                self.endpoints.get(channel_id).map(|endpoint| ParticipantInfo {
                    channel_id: channel_id.clone(),
                    endpoint,
                })
            })
            .collect();
        SessionSnapshot {
            bridge_id: record.bridge_id().clone(),
            classification: record.classification(),
            active_count: record.active_count(),
            participants,
            created_at: record.created_at(),
        }
    }

    /// Mark the record closed and drop it from the registries. Must be called
    /// with the session lock held.
    fn claim_for_teardown(&self, record: &mut SessionRecord) -> Vec<ChannelId> {
        let remaining = record.close();
        let bridge_id = record.bridge_id().clone();
        for channel_id in &remaining {
            self.endpoints.remove(channel_id);
        }
        self.sessions.unregister(&bridge_id);
        self.monitors.remove(&bridge_id);
        remaining
    }

    /// Hang up what is left and delete the bridge, logging every failure
    async fn release_bridge(&self, bridge_id: &BridgeId, mut channels: Vec<ChannelId>) {
        match self.bus.bridge_channel_ids(bridge_id).await {
            Ok(reported) => {
                for channel_id in reported {
                    if !channels.contains(&channel_id) {
                        channels.push(channel_id);
                    }
                }
            }
            Err(e) => tracing::warn!("Unable to access bridge {} data: {}", bridge_id, e),
        }

        for channel_id in &channels {
            if let Err(e) = self.bus.hangup_channel(channel_id).await {
                tracing::error!("Unable to destroy remaining channel {}: {}", channel_id, e);
            }
        }

        if let Err(e) = self.bus.delete_bridge(bridge_id).await {
            tracing::error!("Unable to delete bridge {}: {}", bridge_id, e);
        }

        tracing::info!("Bridge {} torn down ({} channels hung up)", bridge_id, channels.len());
        self.events.publish(BridgeEvent::SessionTornDown {
            bridge_id: bridge_id.clone(),
        });
    }

    async fn play_best_effort(&self, bridge_id: &BridgeId, sound: &SoundRef) {
        if let Err(e) = self.bus.play_sound(bridge_id, sound).await {
            tracing::warn!("Failed to play {} on bridge {}: {}", sound, bridge_id, e);
        }
    }

    fn spawn_monitor(self: &Arc<Self>, bridge_id: BridgeId, departures: DepartureStream) {
        self.monitors.retain(|_, handle| !handle.is_finished());

        let span = tracing::info_span!("departure_monitor", bridge_id = %bridge_id);
        let monitor = DepartureMonitor::new(bridge_id.clone(), Arc::clone(self), departures);
        let handle = tokio::spawn(
            async move {
                monitor.run().await;
            }
            .instrument(span),
        );
        self.monitors.insert(bridge_id, handle);
    }
}

impl std::fmt::Debug for BridgeLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeLifecycleManager")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}
