//! Session Registry and Endpoint Directory
//!
//! Both stores are shared between the command path and every departure
//! monitor. The registry hands out one lock per session; every read-modify-write
//! of a session's count, classification or attached set happens while holding
//! it, and the matching Endpoint Directory update happens in the same critical
//! section.

mod endpoints;
mod sessions;

pub use endpoints::EndpointDirectory;
pub use sessions::{RegistryStats, SharedSession, SessionRecord, SessionRegistry};
