//! Rank 0's side of the protocol: fan out, collect, merge, release

use tracing::{debug, info, warn};

use super::messages::{Command, Message};
use super::transport::{Transport, WaitPolicy};
use crate::count_table::CountTable;
use crate::error::ProtocolError;
use crate::partition::Rank;

#[derive(Debug, Clone)]
pub struct Coordinator {
    world_size: u32,
    wait: WaitPolicy,
}

impl Coordinator {
    pub fn new(world_size: u32, wait: WaitPolicy) -> Self {
        Self { world_size, wait }
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Worker ranks in ascending order
    pub fn workers(&self) -> impl Iterator<Item = Rank> {
        (1..self.world_size).map(Rank::new)
    }

    /// Run the whole exchange and return the merged table.
    ///
    /// Workers are always sent `exit`, including when collection fails, so
    /// that none of them is left waiting for a command that never comes.
    pub fn run<T: Transport>(
        &self,
        transport: &mut T,
        local: CountTable,
    ) -> Result<CountTable, ProtocolError> {
        if self.world_size <= 1 {
            return Ok(local);
        }

        let collected = self.collect(transport, local);
        let released = self.release(transport);

        let merged = collected?;
        released?;
        Ok(merged)
    }

    /// Ask every worker for its table, then merge them in rank order
    pub fn collect<T: Transport>(
        &self,
        transport: &mut T,
        local: CountTable,
    ) -> Result<CountTable, ProtocolError> {
        for rank in self.workers() {
            transport.send(rank, Command::ReturnData.into())?;
        }
        debug!(workers = self.world_size - 1, "Requested counts from all workers");

        let mut merged = local;
        for rank in self.workers() {
            match transport.recv(rank, &self.wait)? {
                Message::Counts { table } => {
                    info!(rank = rank.get(), keys = table.len(), "Received counts");
                    merged = merged.merge(table);
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        from: rank,
                        expected: "counts",
                        got: other.kind(),
                    })
                }
            }
        }
        Ok(merged)
    }

    /// Send `exit` to every worker.
    ///
    /// Keeps going past failed sends and returns the first failure.
    pub fn release<T: Transport>(&self, transport: &mut T) -> Result<(), ProtocolError> {
        let mut first_error = None;
        for rank in self.workers() {
            if let Err(e) = transport.send(rank, Command::Exit.into()) {
                warn!(rank = rank.get(), error = %e, "Could not release worker");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
