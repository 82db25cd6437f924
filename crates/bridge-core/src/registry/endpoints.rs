//! Channel id to endpoint address lookup

use dashmap::DashMap;

use crate::types::{ChannelId, EndpointAddress};

/// Maps each attached channel to the address it was dialed on
#[derive(Debug, Default)]
pub struct EndpointDirectory {
    endpoints: DashMap<ChannelId, EndpointAddress>,
}

impl EndpointDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, channel_id: ChannelId, endpoint: EndpointAddress) {
        tracing::debug!("Endpoint directory: {} -> {}", channel_id, endpoint);
        self.endpoints.insert(channel_id, endpoint);
    }

    pub fn remove(&self, channel_id: &ChannelId) -> Option<EndpointAddress> {
        self.endpoints.remove(channel_id).map(|(_, endpoint)| endpoint)
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<EndpointAddress> {
        self.endpoints.get(channel_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.endpoints.contains_key(channel_id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
