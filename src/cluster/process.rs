//! Transports for ranks running as separate OS processes
//!
//! The coordinator starts one child per worker rank with piped stdin and
//! stdout. Each direction of a link is a stream of JSON-encoded `Envelope`s,
//! one per line. A background thread per incoming stream decodes frames into
//! a channel so that receives can honour the same `WaitPolicy` as the
//! in-memory transport.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command as ProcessCommand, ExitStatus, Stdio};
use std::thread;
use tracing::{debug, warn};

use super::messages::{Envelope, Message};
use super::transport::{AddressBook, Transport, WaitPolicy};
use crate::error::ProtocolError;
use crate::partition::Rank;

/// One decoded line from a peer's stream
pub type Frame = Result<Envelope, ProtocolError>;

/// Decode newline-delimited envelopes from `reader` on a background thread.
///
/// The returned channel closes when the stream ends; a read error or an
/// undecodable line is delivered as an error frame and ends the stream.
pub fn spawn_frame_reader<R>(peer: Rank, reader: R) -> Receiver<Frame>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name(format!("frames-{}", peer.get()))
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                let frame = match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => serde_json::from_str::<Envelope>(&line)
                        .map_err(|source| ProtocolError::Codec { peer, source }),
                    Err(source) => Err(ProtocolError::Io { peer, source }),
                };
                let failed = frame.is_err();
                if tx.send(frame).is_err() || failed {
                    break;
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| warn!(peer = peer.get(), error = %e, "Failed to start frame reader"));
    rx
}

/// Write one envelope as a JSON line and flush it
fn write_frame<W: Write>(peer: Rank, out: &mut W, envelope: &Envelope) -> Result<(), ProtocolError> {
    serde_json::to_writer(&mut *out, envelope).map_err(|source| ProtocolError::Codec { peer, source })?;
    out.write_all(b"\n")
        .and_then(|_| out.flush())
        .map_err(|source| match source.kind() {
            io::ErrorKind::BrokenPipe => ProtocolError::Disconnected(peer),
            _ => ProtocolError::Io { peer, source },
        })
}

fn recv_frame(
    own: Rank,
    peer: Rank,
    inbox: &Receiver<Frame>,
    wait: &WaitPolicy,
) -> Result<Message, ProtocolError> {
    wait.recv_from(peer, inbox)??.open_for(own)
}

/// Coordinator-side link to one child process
#[derive(Debug)]
pub struct ChildLink {
    child: Child,
    stdin: Option<ChildStdin>,
    inbox: Receiver<Frame>,
}

/// Coordinator transport over child processes
#[derive(Debug)]
pub struct ProcessTransport {
    peers: AddressBook<ChildLink>,
}

impl ProcessTransport {
    /// Start `program args... --worker-rank r --world-size n` for every worker rank
    pub fn spawn(program: &Path, args: &[String], world_size: u32) -> Result<Self> {
        let mut peers = AddressBook::new();

        for r in 1..world_size {
            let rank = Rank::new(r);
            let mut child = ProcessCommand::new(program)
                .args(args)
                .arg("--worker-rank")
                .arg(r.to_string())
                .arg("--world-size")
                .arg(world_size.to_string())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .with_context(|| format!("Failed to start {} ({})", rank, program.display()))?;

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("No stdout pipe for {}", rank))?;
            let stdin = child.stdin.take();
            debug!(rank = r, pid = child.id(), "Started worker process");

            peers.insert(
                rank,
                ChildLink {
                    child,
                    stdin,
                    inbox: spawn_frame_reader(rank, stdout),
                },
            );
        }

        Ok(Self { peers })
    }

    /// Kill every child that is still running
    pub fn kill(&mut self) {
        for (rank, link) in self.peers.links_mut() {
            drop(link.stdin.take());
            if let Err(e) = link.child.kill() {
                debug!(rank = rank.get(), error = %e, "Worker process already gone");
            }
        }
    }

    /// Close every child's stdin and wait for all of them to exit
    pub fn wait(self) -> Result<Vec<(Rank, ExitStatus)>> {
        let mut statuses = Vec::with_capacity(self.peers.len());
        for (rank, mut link) in self.peers.into_links() {
            drop(link.stdin.take());
            let status = link
                .child
                .wait()
                .with_context(|| format!("Failed to wait for {}", rank))?;
            statuses.push((rank, status));
        }
        Ok(statuses)
    }
}

impl Transport for ProcessTransport {
    fn rank(&self) -> Rank {
        Rank::COORDINATOR
    }

    fn send(&mut self, to: Rank, body: Message) -> Result<(), ProtocolError> {
        let link = self.peers.get_mut(to)?;
        let stdin = link.stdin.as_mut().ok_or(ProtocolError::Disconnected(to))?;
        write_frame(to, stdin, &Envelope::new(to, body))
    }

    fn recv(&mut self, from: Rank, wait: &WaitPolicy) -> Result<Message, ProtocolError> {
        let link = self.peers.get(from)?;
        recv_frame(Rank::COORDINATOR, from, &link.inbox, wait)
    }
}

/// Worker-side link to the coordinator over this process's stdin/stdout
pub struct StdioLink<W> {
    out: W,
    inbox: Receiver<Frame>,
}

/// Worker transport: commands arrive on stdin, counts leave on stdout
pub struct StdioTransport<W = io::Stdout> {
    rank: Rank,
    peers: AddressBook<StdioLink<W>>,
}

impl StdioTransport<io::Stdout> {
    /// Transport over the real standard streams
    pub fn from_std(rank: Rank) -> Self {
        Self::new(rank, io::stdin(), io::stdout())
    }
}

impl<W: Write> StdioTransport<W> {
    pub fn new<R>(rank: Rank, input: R, out: W) -> Self
    where
        R: Read + Send + 'static,
    {
        let mut peers = AddressBook::new();
        peers.insert(
            Rank::COORDINATOR,
            StdioLink {
                out,
                inbox: spawn_frame_reader(Rank::COORDINATOR, input),
            },
        );
        Self { rank, peers }
    }
}

impl<W: Write> Transport for StdioTransport<W> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn send(&mut self, to: Rank, body: Message) -> Result<(), ProtocolError> {
        let link = self.peers.get_mut(to)?;
        write_frame(to, &mut link.out, &Envelope::new(to, body))
    }

    fn recv(&mut self, from: Rank, wait: &WaitPolicy) -> Result<Message, ProtocolError> {
        let link = self.peers.get(from)?;
        recv_frame(self.rank, from, &link.inbox, wait)
    }
}
