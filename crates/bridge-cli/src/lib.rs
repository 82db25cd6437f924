//! # RVoIP Bridge CLI
//!
//! Operator console for ARI call and conference bridges. The `confbridge`
//! binary reads one command per line:
//!
//! ```text
//! dial alice bob            two-party call
//! dial alice bob carol      conference
//! join <bridge-id> dave     add a participant
//! list                      show active sessions
//! exit
//! ```

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod logging;

pub use command::{Command, CommandError};
pub use config::{AppConfig, ConfigError, Overrides};
pub use dispatcher::{CommandDispatcher, Flow};
pub use logging::{setup_logging, LoggingConfig};
