//! Operator command parsing
//!
//! One command per input line: a command word followed by whitespace
//! separated arguments.

use std::fmt;

use thiserror::Error;

use rvoip_bridge_core::{BridgeId, ChannelId};

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `dial <endpoint> <endpoint> [endpoint...]`
    Dial(Vec<String>),
    /// `list`
    List,
    /// `join <bridge-id> <endpoint> [endpoint...]`
    Join {
        session_id: BridgeId,
        addresses: Vec<String>,
    },
    /// `hangup <channel-id>`, simulates the far end hanging up (simulate mode only)
    Hangup(ChannelId),
    /// `help`
    Help,
    /// `exit`
    Exit,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("No command entered")]
    Empty,

    #[error("Command '{command}' needs at least {required} arguments")]
    NotEnoughArguments { command: &'static str, required: usize },

    #[error("Invalid command '{0}', type 'help' for the list of commands")]
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let word = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<String> = words.map(str::to_string).collect();

        match word.to_ascii_lowercase().as_str() {
            "dial" => {
                require("dial", &args, 2)?;
                Ok(Command::Dial(args))
            }
            "list" => Ok(Command::List),
            "join" => {
                require("join", &args, 2)?;
                let mut args = args.into_iter();
                let session_id = BridgeId::new(args.next().unwrap_or_default());
                Ok(Command::Join {
                    session_id,
                    addresses: args.collect(),
                })
            }
            "hangup" => {
                require("hangup", &args, 1)?;
                Ok(Command::Hangup(ChannelId::new(args[0].clone())))
            }
            "help" | "?" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Dial(_) => "dial",
            Command::List => "list",
            Command::Join { .. } => "join",
            Command::Hangup(_) => "hangup",
            Command::Help => "help",
            Command::Exit => "exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Dial(addresses) => write!(f, "dial {}", addresses.join(" ")),
            Command::Join { session_id, addresses } => {
                write!(f, "join {} {}", session_id, addresses.join(" "))
            }
            Command::Hangup(channel_id) => write!(f, "hangup {}", channel_id),
            other => f.write_str(other.name()),
        }
    }
}

fn require(command: &'static str, args: &[String], required: usize) -> Result<(), CommandError> {
    if args.len() < required {
        return Err(CommandError::NotEnoughArguments { command, required });
    }
    Ok(())
}

/// Usage text printed by `help`
pub const USAGE: &str = "\
Commands:
  dial <endpoint> <endpoint> [endpoint...]   Start a call (two endpoints) or a conference (3+)
  join <bridge-id> <endpoint> [endpoint...]  Add endpoints to an existing call or conference
  list                                       Show active calls and conferences
  help                                       Show this help
  exit                                       Quit";
