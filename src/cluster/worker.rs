//! Worker agent: count once, then serve the coordinator's commands

use anyhow::Result;
use tracing::{debug, info};

use super::messages::{Command, Message};
use super::transport::{Transport, WaitPolicy};
use crate::count_table::CountTable;
use crate::counter::count_partition;
use crate::error::ProtocolError;
use crate::input::Row;
use crate::matcher::Matcher;
use crate::partition::{Partition, Rank};
use crate::stats::CountStats;

/// What the worker does in response to one command
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Reply(CountTable),
    Terminate,
}

/// Terminal status of a worker that was told to exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub rank: Rank,
    /// How many times the table was sent
    pub replies: usize,
}

/// A worker whose partition has been counted and which is awaiting commands
#[derive(Debug, Clone)]
pub struct WorkerAgent {
    rank: Rank,
    table: CountTable,
    replies: usize,
}

impl WorkerAgent {
    /// Wrap an already computed table
    pub fn new(rank: Rank, table: CountTable) -> Self {
        Self {
            rank,
            table,
            replies: 0,
        }
    }

    /// Count the partition, moving from computing to awaiting commands
    pub fn compute<I>(rows: I, partition: Partition, matcher: &Matcher) -> Result<(Self, CountStats)>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        let (table, stats) = count_partition(rows, partition, matcher)?;
        Ok((Self::new(partition.rank(), table), stats))
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn table(&self) -> &CountTable {
        &self.table
    }

    /// React to a single command
    pub fn handle(&mut self, command: Command) -> Step {
        match command {
            Command::ReturnData => {
                self.replies += 1;
                Step::Reply(self.table.clone())
            }
            Command::Exit => Step::Terminate,
        }
    }

    /// Serve commands from the coordinator until told to exit
    pub fn serve<T: Transport>(
        mut self,
        transport: &mut T,
        wait: &WaitPolicy,
    ) -> Result<WorkerExit, ProtocolError> {
        debug!(rank = self.rank.get(), "Awaiting commands");
        loop {
            let command = match transport.recv(Rank::COORDINATOR, wait)? {
                Message::Command { command } => command.parse::<Command>()?,
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        from: Rank::COORDINATOR,
                        expected: "command",
                        got: other.kind(),
                    })
                }
            };

            match self.handle(command) {
                Step::Reply(table) => {
                    info!(rank = self.rank.get(), keys = table.len(), "Returning counts to coordinator");
                    transport.send(Rank::COORDINATOR, Message::Counts { table })?;
                }
                Step::Terminate => {
                    debug!(rank = self.rank.get(), replies = self.replies, "Exiting");
                    return Ok(WorkerExit {
                        rank: self.rank,
                        replies: self.replies,
                    });
                }
            }
        }
    }
}
