//! Error types for tweetcount
//!
//! Application code propagates `anyhow::Error`. The two places where callers
//! need to tell failure kinds apart get their own enums:
//! - `DecodeError`: one record could not be decoded (skipped, never fatal)
//! - `ProtocolError`: the coordinator/worker exchange went wrong

use std::time::Duration;
use thiserror::Error;

use crate::partition::Rank;

/// Failure to turn a raw payload into a tweet
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("invalid tweet JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the command/response exchange between ranks
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A worker received a command value it does not understand
    #[error("unknown command '{0}' (expected 'return_data' or 'exit')")]
    UnknownCommand(String),

    /// A well-formed message arrived where a different kind was expected
    #[error("unexpected {got} message from {from}, expected {expected}")]
    UnexpectedMessage {
        from: Rank,
        expected: &'static str,
        got: &'static str,
    },

    /// A message tagged for another rank was delivered here
    #[error("{rank} received a message tagged for {tag}")]
    MisaddressedMessage { rank: Rank, tag: Rank },

    /// No link is registered for the requested rank
    #[error("no address registered for {0}")]
    UnknownRank(Rank),

    /// The peer hung up (its channel or stream closed)
    #[error("connection to {0} closed")]
    Disconnected(Rank),

    /// The receive deadline passed
    #[error("timed out after {} waiting for {peer}", humantime::format_duration(.waited.to_owned()))]
    Timeout { peer: Rank, waited: Duration },

    /// The receive was cancelled by a shutdown request
    #[error("receive from {0} cancelled")]
    Cancelled(Rank),

    /// Counting at this rank stopped on a shutdown request
    #[error("{0} stopped counting on shutdown request")]
    Interrupted(Rank),

    /// A frame on a process stream was not valid protocol JSON
    #[error("malformed frame from {peer}: {source}")]
    Codec {
        peer: Rank,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a process stream failed
    #[error("I/O error talking to {peer}: {source}")]
    Io {
        peer: Rank,
        #[source]
        source: std::io::Error,
    },
}

impl ProtocolError {
    /// True for failures caused by an external shutdown request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProtocolError::Cancelled(_) | ProtocolError::Interrupted(_))
    }
}
