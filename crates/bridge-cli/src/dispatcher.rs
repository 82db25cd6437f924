//! Command Dispatcher
//!
//! Turns operator commands into lifecycle manager calls and renders the
//! results as text.

use std::io::{self, Write};
use std::sync::Arc;

use rvoip_bridge_core::{AttachReport, BridgeLifecycleManager, InMemoryBus, SessionSnapshot};

use crate::command::{Command, CommandError, USAGE};

/// Whether the console keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct CommandDispatcher {
    manager: Arc<BridgeLifecycleManager>,
    simulator: Option<Arc<InMemoryBus>>,
}

impl CommandDispatcher {
    pub fn new(manager: Arc<BridgeLifecycleManager>) -> Self {
        Self {
            manager,
            simulator: None,
        }
    }

    /// Enable `hangup <channel-id>` against an in-memory bus
    pub fn with_simulator(mut self, bus: Arc<InMemoryBus>) -> Self {
        self.simulator = Some(bus);
        self
    }

    pub fn manager(&self) -> &Arc<BridgeLifecycleManager> {
        &self.manager
    }

    /// Parse and run one input line
    pub async fn handle_line<W: Write>(&self, line: &str, out: &mut W) -> io::Result<Flow> {
        match Command::parse(line) {
            Ok(command) => self.dispatch(command, out).await,
            Err(CommandError::Empty) => Ok(Flow::Continue),
            Err(e) => {
                tracing::error!("{}", e);
                writeln!(out, "{}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn dispatch<W: Write>(&self, command: Command, out: &mut W) -> io::Result<Flow> {
        tracing::debug!("Dispatching '{}'", command);
        match command {
            Command::Dial(addresses) => {
                match self.manager.create_session(&addresses).await {
                    Ok(session) => {
                        writeln!(out, "Started {} {}", session.classification, session.bridge_id)?;
                        write_report(out, &session.report)?;
                    }
                    Err(e) => {
                        tracing::error!("Dial failed: {}", e);
                        writeln!(out, "Dial failed: {}", e)?;
                    }
                }
            }
            Command::List => {
                for line in render_sessions(&self.manager.list_sessions().await) {
                    writeln!(out, "{}", line)?;
                }
            }
            Command::Join {
                session_id,
                addresses,
            } => match self.manager.join_existing_session(&session_id, &addresses).await {
                Ok(report) => {
                    writeln!(out, "Joined {}", session_id)?;
                    write_report(out, &report)?;
                }
                Err(e) if e.is_not_found() => {
                    writeln!(out, "Call {} is not available", session_id)?;
                }
                Err(e) => {
                    tracing::error!("Join failed: {}", e);
                    writeln!(out, "Join failed: {}", e)?;
                }
            },
            Command::Hangup(channel_id) => match &self.simulator {
                Some(bus) => {
                    if let Err(e) = bus.remote_hangup(&channel_id) {
                        writeln!(out, "Hangup failed: {}", e)?;
                    }
                }
                None => writeln!(out, "hangup is only available in simulate mode")?,
            },
            Command::Help => writeln!(out, "{}", USAGE)?,
            Command::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }
}

fn write_report<W: Write>(out: &mut W, report: &AttachReport) -> io::Result<()> {
    for participant in &report.joined {
        writeln!(out, "  {} joined on {}", participant.endpoint, participant.channel_id)?;
    }
    for (endpoint, reason) in &report.failed {
        writeln!(out, "  {} did not join: {}", endpoint, reason)?;
    }
    Ok(())
}

/// One line per session, e.g. `mixing-1 [call]: PJSIP/alice, PJSIP/bob`
pub fn render_sessions(sessions: &[SessionSnapshot]) -> Vec<String> {
    if sessions.is_empty() {
        return vec!["There are currently no active calls".to_string()];
    }
    sessions
        .iter()
        .map(|session| {
            let endpoints: Vec<String> =
                session.endpoints().iter().map(|e| e.to_string()).collect();
            format!(
                "{} [{}]: {}",
                session.bridge_id,
                session.classification,
                endpoints.join(", ")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rvoip_bridge_core::{BridgeId, ChannelId, Classification, EndpointAddress, ParticipantInfo};

    #[test]
    fn test_render_empty() {
        assert_eq!(render_sessions(&[]), vec!["There are currently no active calls".to_string()]);
    }

    #[test]
    fn test_render_sessions() {
        let participant = |channel: &str, endpoint: &str| ParticipantInfo {
            channel_id: ChannelId::from(channel),
            endpoint: EndpointAddress::qualify(endpoint, "PJSIP"),
        };
        let sessions = vec![
            SessionSnapshot {
                bridge_id: BridgeId::from("mixing-1"),
                classification: Classification::Call,
                active_count: 2,
                participants: vec![
                    participant("channel-1", "alice"),
                    participant("channel-2", "bob"),
                ],
                created_at: Utc::now(),
            },
            SessionSnapshot {
                bridge_id: BridgeId::from("mixing-2"),
                classification: Classification::Conference,
                active_count: 1,
                participants: vec![participant("channel-5", "carol")],
                created_at: Utc::now(),
            },
        ];

        assert_eq!(
            render_sessions(&sessions),
            vec![
                "mixing-1 [call]: PJSIP/alice, PJSIP/bob".to_string(),
                "mixing-2 [conference]: PJSIP/carol".to_string(),
            ]
        );
    }
}
