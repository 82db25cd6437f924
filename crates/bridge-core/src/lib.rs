//! # RVoIP Bridge Core
//!
//! Bridge and channel lifecycle management for multi-party telephony sessions
//! driven through a call-control signaling bus.
//!
//! A session is one mixing bridge plus the channels attached to it. Dialing two
//! endpoints makes a **call**, dialing three or more (or joining a third party
//! later) makes a **conference**. A call ends as soon as either party leaves; a
//! conference ends when its last participant leaves.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            BridgeLifecycleManager            │
//! │  create / attach / join / teardown / list    │
//! ├──────────────────┬───────────────────────────┤
//! │ SessionRegistry  │    EndpointDirectory      │
//! ├──────────────────┴───────────────────────────┤
//! │  DepartureMonitor (one task per bridge)      │
//! ├──────────────────────────────────────────────┤
//! │  SignalingBus (ARI client / InMemoryBus)     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_bridge_core::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let bus = Arc::new(InMemoryBus::new());
//! let manager = BridgeLifecycleManager::new(bus, BridgeConfig::default())?;
//!
//! let session = manager.create_session(&["alice", "bob"]).await?;
//! assert_eq!(session.classification, Classification::Call);
//!
//! manager.join_existing_session(&session.bridge_id, &["carol"]).await?;
//! for snapshot in manager.list_sessions().await {
//!     println!("{} [{}]", snapshot.bridge_id, snapshot.classification);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod events;
pub mod manager;
pub mod memory;
pub mod monitor;
pub mod registry;
pub mod signaling;
pub mod types;

pub use config::BridgeConfig;
pub use errors::{BridgeError, Result};
pub use events::{BridgeEvent, EventPublisher};
pub use manager::{AttachReport, BridgeLifecycleManager, DepartureOutcome, SessionHandle};
pub use memory::{BusCall, BusOperation, InMemoryBus};
pub use monitor::{DepartureMonitor, MonitorState};
pub use registry::{EndpointDirectory, RegistryStats, SessionRecord, SessionRegistry};
pub use signaling::{DepartureStream, SignalingBus};
pub use types::{
    BridgeId, ChannelId, Classification, DepartureEvent, EndpointAddress, ParticipantInfo,
    SessionSnapshot, SoundRef,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        AttachReport, BridgeConfig, BridgeError, BridgeEvent, BridgeId, BridgeLifecycleManager,
        ChannelId, Classification, DepartureEvent, DepartureOutcome, EndpointAddress, InMemoryBus,
        Result, SessionHandle, SessionSnapshot, SignalingBus,
    };
}
