//! Bridge id to session metadata

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::types::{BridgeId, ChannelId, Classification};

/// Shared, lockable session record
pub type SharedSession = Arc<Mutex<SessionRecord>>;

/// Metadata for one session.
///
/// `active_count` always equals `attached.len()` once a mutation returns.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    bridge_id: BridgeId,
    classification: Classification,
    active_count: usize,
    attached: Vec<ChannelId>,
    created_at: DateTime<Utc>,
    closed: bool,
}

impl SessionRecord {
    pub fn new(bridge_id: BridgeId, classification: Classification) -> Self {
        Self {
            bridge_id,
            classification,
            active_count: 0,
            attached: Vec::new(),
            created_at: Utc::now(),
            closed: false,
        }
    }

    pub fn bridge_id(&self) -> &BridgeId {
        &self.bridge_id
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn attached(&self) -> &[ChannelId] {
        &self.attached
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Set once teardown has claimed the session
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Record a joined channel and promote the classification if needed.
    /// Returns the new active count.
    pub fn attach(&mut self, channel_id: ChannelId) -> usize {
        if !self.attached.contains(&channel_id) {
            self.attached.push(channel_id);
            self.active_count += 1;
        }
        self.classification = self.classification.promote(self.active_count);
        self.active_count
    }

    /// Record a departed channel. Returns the new active count, or `None` if
    /// the channel was not attached.
    pub fn detach(&mut self, channel_id: &ChannelId) -> Option<usize> {
        let position = self.attached.iter().position(|c| c == channel_id)?;
        self.attached.remove(position);
        self.active_count = self.active_count.saturating_sub(1);
        Some(self.active_count)
    }

    /// A call ends on any departure; a conference ends once empty
    pub fn should_teardown(&self) -> bool {
        self.classification == Classification::Call || self.active_count < 1
    }

    /// Claim the session for teardown, returning the channels still attached
    pub fn close(&mut self) -> Vec<ChannelId> {
        self.closed = true;
        self.active_count = 0;
        std::mem::take(&mut self.attached)
    }
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub total_created: usize,
    pub total_torn_down: usize,
}

/// Tracks every live session by bridge id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<BridgeId, SharedSession>,
    total_created: AtomicUsize,
    total_torn_down: AtomicUsize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session with an active count of zero
    pub fn register(&self, bridge_id: BridgeId, classification: Classification) -> SharedSession {
        let handle = Arc::new(Mutex::new(SessionRecord::new(bridge_id.clone(), classification)));
        self.sessions.insert(bridge_id.clone(), Arc::clone(&handle));
        self.total_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Registered session {} as {}", bridge_id, classification);
        handle
    }

    pub fn get(&self, bridge_id: &BridgeId) -> Option<SharedSession> {
        self.sessions.get(bridge_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session; `None` if it was already gone
    pub fn unregister(&self, bridge_id: &BridgeId) -> Option<SharedSession> {
        let removed = self.sessions.remove(bridge_id).map(|(_, handle)| handle);
        if removed.is_some() {
            self.total_torn_down.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Unregistered session {}", bridge_id);
        }
        removed
    }

    pub fn contains(&self, bridge_id: &BridgeId) -> bool {
        self.sessions.contains_key(bridge_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Handles of every session, sorted by bridge id
    pub fn handles(&self) -> Vec<(BridgeId, SharedSession)> {
        let mut handles: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_sessions: self.sessions.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_torn_down: self.total_torn_down.load(Ordering::Relaxed),
        }
    }
}
