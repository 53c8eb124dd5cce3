//! Message types exchanged between the coordinator and its workers
//!
//! Commands travel as their symbolic names (`return_data`, `exit`) so the
//! stream stays readable; they are turned into the closed `Command` enum at
//! the receiving end, where anything else is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::count_table::CountTable;
use crate::error::ProtocolError;
use crate::partition::Rank;

/// Instruction from the coordinator to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Send the worker's count table to the coordinator
    ReturnData,
    /// Stop serving
    Exit,
}

impl Command {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::ReturnData => "return_data",
            Command::Exit => "exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "return_data" => Ok(Command::ReturnData),
            "exit" => Ok(Command::Exit),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Message body on a rank-to-rank channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Coordinator to worker
    Command { command: String },
    /// Worker to coordinator
    Counts { table: CountTable },
}

impl Message {
    pub fn command(command: Command) -> Self {
        Message::Command {
            command: command.as_str().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Command { .. } => "command",
            Message::Counts { .. } => "counts",
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::command(command)
    }
}

/// A message plus the rank it is addressed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub tag: Rank,
    pub body: Message,
}

impl Envelope {
    pub fn new(tag: Rank, body: Message) -> Self {
        Self { tag, body }
    }

    /// Unwrap the body, checking that it was meant for `rank`
    pub fn open_for(self, rank: Rank) -> Result<Message, ProtocolError> {
        if self.tag != rank {
            return Err(ProtocolError::MisaddressedMessage {
                rank,
                tag: self.tag,
            });
        }
        Ok(self.body)
    }
}
