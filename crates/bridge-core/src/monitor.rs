//! Departure Monitor
//!
//! One monitor runs per session. It waits, without timeout, for the next
//! departure on its bridge and hands it to the lifecycle manager. The monitor
//! stays `Active` while the session survives and moves to `Terminated` once the
//! session is torn down, at which point the task exits.

use std::sync::Arc;

use crate::manager::{BridgeLifecycleManager, DepartureOutcome};
use crate::signaling::DepartureStream;
use crate::types::{BridgeId, DepartureEvent};

/// Monitor states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Waiting for departures
    Active,
    /// The session is gone; no further notifications are processed
    Terminated,
}

/// Consumes departures for a single bridge
pub struct DepartureMonitor {
    bridge_id: BridgeId,
    manager: Arc<BridgeLifecycleManager>,
    departures: DepartureStream,
    state: MonitorState,
    processed: usize,
}

impl DepartureMonitor {
    pub fn new(
        bridge_id: BridgeId,
        manager: Arc<BridgeLifecycleManager>,
        departures: DepartureStream,
    ) -> Self {
        Self {
            bridge_id,
            manager,
            departures,
            state: MonitorState::Active,
            processed: 0,
        }
    }

    /// Run until the session is torn down. Returns the number of departures
    /// processed.
    pub async fn run(mut self) -> usize {
        tracing::debug!("Departure monitor started for bridge {}", self.bridge_id);

        while self.state == MonitorState::Active {
            match self.departures.recv().await {
                Some(event) => self.on_departure(event).await,
                None => {
                    // The bus dropped the subscription; nothing can drive this
                    // session any more.
                    tracing::warn!("Departure stream for bridge {} closed", self.bridge_id);
                    self.manager.teardown_session(&self.bridge_id).await;
                    self.state = MonitorState::Terminated;
                }
            }
        }

        tracing::debug!(
            "Departure monitor for bridge {} terminated after {} departures",
            self.bridge_id,
            self.processed
        );
        self.processed
    }

    async fn on_departure(&mut self, event: DepartureEvent) {
        if event.bridge_id != self.bridge_id {
            tracing::warn!(
                "Monitor for bridge {} ignored departure addressed to {}",
                self.bridge_id,
                event.bridge_id
            );
            return;
        }

        self.processed += 1;
        self.state = match self.manager.handle_departure(&event).await {
            DepartureOutcome::Remaining(count) => {
                tracing::debug!("Bridge {} still has {} participants", self.bridge_id, count);
                MonitorState::Active
            }
            DepartureOutcome::Untracked => MonitorState::Active,
            DepartureOutcome::TornDown | DepartureOutcome::SessionGone => MonitorState::Terminated,
        };
    }
}

impl std::fmt::Debug for DepartureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepartureMonitor")
            .field("bridge_id", &self.bridge_id)
            .field("state", &self.state)
            .field("processed", &self.processed)
            .finish()
    }
}
