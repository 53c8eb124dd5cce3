//! Starting every rank of a run and collecting the final table
//!
//! In `threads` mode all ranks share this process and talk over in-memory
//! channels. In `processes` mode the coordinator re-executes the current
//! binary once per worker rank and talks to each child over its stdio.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::thread;
use tracing::{debug, info, warn};

use super::coordinator::Coordinator;
use super::process::{ProcessTransport, StdioTransport};
use super::transport::{channel_mesh, Transport, WaitPolicy};
use super::worker::{WorkerAgent, WorkerExit};
use crate::config::RunConfig;
use crate::count_table::CountTable;
use crate::error::ProtocolError;
use crate::input::{InputSource, RowReader};
use crate::matcher::Matcher;
use crate::partition::{Partition, Rank};
use crate::stats::CountStats;

fn open_rows(config: &RunConfig) -> Result<RowReader> {
    InputSource::new(&config.input.path, config.input.field.clone()).open()
}

fn report_stats(config: &RunConfig, rank: Rank, stats: &CountStats) {
    if config.output.stats {
        eprintln!("{}", stats.format_stats(rank));
    }
}

/// Count one rank's partition of an already opened source
fn count_rank(
    config: &RunConfig,
    matcher: &Matcher,
    rank: Rank,
    rows: RowReader,
) -> Result<WorkerAgent> {
    let partition = Partition::new(rank, config.cluster.world_size)?;
    let (agent, stats) = WorkerAgent::compute(rows, partition, matcher)?;
    report_stats(config, rank, &stats);
    Ok(agent)
}

/// Count rank 0's partition and drive the exchange with the workers.
///
/// If the local count fails the workers are still released.
fn coordinate<T: Transport>(
    config: &RunConfig,
    matcher: &Matcher,
    rows: RowReader,
    transport: &mut T,
    wait: WaitPolicy,
) -> Result<CountTable> {
    let coordinator = Coordinator::new(config.cluster.world_size, wait);

    match count_rank(config, matcher, Rank::COORDINATOR, rows) {
        Ok(agent) => {
            let merged = coordinator.run(transport, agent.table().clone())?;
            info!(keys = merged.len(), total = merged.total(), "Merged counts from all ranks");
            Ok(merged)
        }
        Err(e) => {
            // the local error is the one worth reporting
            let _ = coordinator.release(transport);
            Err(e)
        }
    }
}

fn is_cancellation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ProtocolError>()
        .is_some_and(ProtocolError::is_cancelled)
}

/// Prefer a worker's own failure over the disconnect it caused at rank 0
fn pick_error(coordinator: anyhow::Error, worker: Option<anyhow::Error>) -> anyhow::Error {
    let disconnected = matches!(
        coordinator.downcast_ref::<ProtocolError>(),
        Some(ProtocolError::Disconnected(_))
    );
    match worker {
        Some(worker) if disconnected => worker,
        _ => coordinator,
    }
}

/// Run every rank as a thread of this process
pub fn run_threads(config: &RunConfig, wait: WaitPolicy) -> Result<CountTable> {
    let world_size = config.cluster.world_size;
    let matcher = Matcher::new(&config.search)?;

    // fail before starting any rank if the input is unusable
    let coordinator_rows = open_rows(config)?;

    let mut mesh = channel_mesh(world_size);
    let workers = mesh.split_off(1);
    let mut coordinator_transport = mesh
        .pop()
        .ok_or_else(|| anyhow!("No transport for the coordinator"))?;

    debug!(world_size, "Starting ranks as threads");

    thread::scope(|scope| -> Result<CountTable> {
        let mut handles = Vec::with_capacity(workers.len());
        for mut transport in workers {
            let rank = transport.rank();
            let matcher = &matcher;
            let handle = thread::Builder::new()
                .name(format!("rank-{}", rank.get()))
                .spawn_scoped(scope, move || -> Result<WorkerExit> {
                    let agent = count_rank(config, matcher, rank, open_rows(config)?)?;
                    Ok(agent.serve(&mut transport, &WaitPolicy::unbounded())?)
                })
                .with_context(|| format!("Failed to start thread for {}", rank))?;
            handles.push((rank, handle));
        }

        let result = coordinate(
            config,
            &matcher,
            coordinator_rows,
            &mut coordinator_transport,
            wait,
        );
        drop(coordinator_transport);

        let mut worker_error = None;
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(exit)) => debug!(rank = exit.rank.get(), replies = exit.replies, "Worker finished"),
                Ok(Err(e)) => {
                    warn!(rank = rank.get(), error = %e, "Worker failed");
                    worker_error.get_or_insert(e.context(format!("{} failed", rank)));
                }
                Err(_) => {
                    worker_error.get_or_insert(anyhow!("{} panicked", rank));
                }
            }
        }

        match (result, worker_error) {
            (Ok(table), None) => Ok(table),
            (Ok(_), Some(worker)) => Err(worker),
            (Err(e), worker) => Err(pick_error(e, worker)),
        }
    })
}

/// Run rank 0 here and every worker rank as a child process of `program`
pub fn run_processes(
    config: &RunConfig,
    wait: WaitPolicy,
    program: &Path,
    child_args: &[String],
) -> Result<CountTable> {
    let world_size = config.cluster.world_size;
    let matcher = Matcher::new(&config.search)?;
    let rows = open_rows(config)?;

    debug!(world_size, program = %program.display(), "Starting ranks as processes");
    let mut transport = ProcessTransport::spawn(program, child_args, world_size)?;

    let result = coordinate(config, &matcher, rows, &mut transport, wait);
    if result.as_ref().is_err_and(is_cancellation) {
        // children have no signal handler of their own
        transport.kill();
    }

    let mut worker_error = None;
    for (rank, status) in transport.wait()? {
        if status.success() {
            debug!(rank = rank.get(), "Worker process exited");
        } else {
            warn!(rank = rank.get(), %status, "Worker process failed");
            worker_error.get_or_insert(anyhow!("{} exited with {}", rank, status));
        }
    }

    match (result, worker_error) {
        (Ok(table), None) => Ok(table),
        (Ok(_), Some(worker)) => Err(worker),
        (Err(e), worker) => Err(pick_error(e, worker)),
    }
}

/// Body of a worker child process: count, then serve the coordinator on stdio
pub fn run_worker_process(config: &RunConfig, rank: Rank) -> Result<WorkerExit> {
    let matcher = Matcher::new(&config.search)?;
    let agent = count_rank(config, &matcher, rank, open_rows(config)?)?;

    let mut transport = StdioTransport::from_std(rank);
    Ok(agent.serve(&mut transport, &WaitPolicy::unbounded())?)
}
