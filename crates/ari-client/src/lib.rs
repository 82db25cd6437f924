//! # RVoIP ARI Client
//!
//! [`SignalingBus`](rvoip_bridge_core::SignalingBus) implementation for the
//! Asterisk REST Interface.
//!
//! - REST calls (`reqwest`) create and delete bridges, create, dial and hang up
//!   channels, and play sounds.
//! - The event WebSocket (`tokio-tungstenite`) delivers `ChannelLeftBridge`
//!   events, which [`EventRouter`] hands to the departure monitor bound to the
//!   bridge. A dropped socket is re-opened with backoff and missed departures
//!   are replayed from each bridge's current membership.
//!
//! ```rust,no_run
//! use rvoip_ari_client::{AriClient, AriConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AriConfig {
//!     password: "secret".to_string(),
//!     ..Default::default()
//! };
//! let client = AriClient::connect(config).await?;
//! let bridge = client.create_bridge_resource("mixing").await?;
//! println!("Bridge created: {}", bridge.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod router;

pub use client::AriClient;
pub use config::{AriConfig, ReconnectConfig};
pub use error::{AriError, Result};
pub use models::{AriEvent, Bridge, Channel};
pub use router::EventRouter;
