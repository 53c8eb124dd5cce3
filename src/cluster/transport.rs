//! Rank-addressed message passing
//!
//! A `Transport` sends to and receives from other ranks by rank, through an
//! explicit address book. Links are FIFO per ordered pair of ranks. Every
//! blocking receive goes through a `WaitPolicy`, which may bound the wait
//! with a deadline or abort it on a shutdown request.

use crossbeam_channel::{at, never, select, unbounded, Receiver, Sender};
use indexmap::IndexMap;
use std::time::{Duration, Instant};

use super::messages::{Envelope, Message};
use crate::error::ProtocolError;
use crate::partition::Rank;
use crate::platform::Ctrl;

pub trait Transport {
    /// This endpoint's rank
    fn rank(&self) -> Rank;

    /// Queue `body` for `to`; does not wait for delivery
    fn send(&mut self, to: Rank, body: Message) -> Result<(), ProtocolError>;

    /// Block until the next message from `from` arrives, subject to `wait`
    fn recv(&mut self, from: Rank, wait: &WaitPolicy) -> Result<Message, ProtocolError>;
}

/// Deadline and cancellation settings for blocking receives
#[derive(Debug, Clone, Default)]
pub struct WaitPolicy {
    deadline: Option<Duration>,
    cancel: Option<Receiver<Ctrl>>,
}

impl WaitPolicy {
    /// Wait forever
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel(mut self, cancel: Receiver<Ctrl>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Receive one item from `rx`, which carries traffic from `peer`
    pub fn recv_from<T>(&self, peer: Rank, rx: &Receiver<T>) -> Result<T, ProtocolError> {
        let expires = self.deadline.map(|d| Instant::now() + d);
        let mut cancel = self.cancel.clone().unwrap_or_else(never);

        loop {
            let timeout = expires.map(at).unwrap_or_else(never);
            select! {
                recv(rx) -> msg => return msg.map_err(|_| ProtocolError::Disconnected(peer)),
                recv(cancel) -> ctrl => {
                    if let Ok(Ctrl::Shutdown) = ctrl {
                        return Err(ProtocolError::Cancelled(peer));
                    }
                }
                recv(timeout) -> _ => {
                    return Err(ProtocolError::Timeout {
                        peer,
                        waited: self.deadline.unwrap_or_default(),
                    })
                }
            }
            // Nobody can cancel any more; keep waiting on the same deadline
            cancel = never();
        }
    }
}

/// Maps ranks to links, in registration order
#[derive(Debug)]
pub struct AddressBook<L> {
    links: IndexMap<Rank, L>,
}

impl<L> Default for AddressBook<L> {
    fn default() -> Self {
        Self {
            links: IndexMap::new(),
        }
    }
}

impl<L> AddressBook<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rank: Rank, link: L) {
        self.links.insert(rank, link);
    }

    pub fn get(&self, rank: Rank) -> Result<&L, ProtocolError> {
        self.links.get(&rank).ok_or(ProtocolError::UnknownRank(rank))
    }

    pub fn get_mut(&mut self, rank: Rank) -> Result<&mut L, ProtocolError> {
        self.links
            .get_mut(&rank)
            .ok_or(ProtocolError::UnknownRank(rank))
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = (Rank, &mut L)> + '_ {
        self.links.iter_mut().map(|(rank, link)| (*rank, link))
    }

    pub fn ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.links.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn into_links(self) -> impl Iterator<Item = (Rank, L)> {
        self.links.into_iter()
    }
}

/// In-memory link to one peer: an outgoing and an incoming FIFO channel
#[derive(Debug)]
pub struct ChannelLink {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

/// Transport for ranks running as threads of one process
#[derive(Debug)]
pub struct ChannelTransport {
    rank: Rank,
    peers: AddressBook<ChannelLink>,
}

impl ChannelTransport {
    pub fn peers(&self) -> &AddressBook<ChannelLink> {
        &self.peers
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn send(&mut self, to: Rank, body: Message) -> Result<(), ProtocolError> {
        let link = self.peers.get(to)?;
        link.tx
            .send(Envelope::new(to, body))
            .map_err(|_| ProtocolError::Disconnected(to))
    }

    fn recv(&mut self, from: Rank, wait: &WaitPolicy) -> Result<Message, ProtocolError> {
        let link = self.peers.get(from)?;
        wait.recv_from(from, &link.rx)?.open_for(self.rank)
    }
}

/// Build transports for a world of `world_size` ranks, indexed by rank.
///
/// The coordinator gets a link to every worker and each worker a link to
/// the coordinator; workers never talk to each other.
pub fn channel_mesh(world_size: u32) -> Vec<ChannelTransport> {
    let mut coordinator = ChannelTransport {
        rank: Rank::COORDINATOR,
        peers: AddressBook::new(),
    };
    let mut workers = Vec::new();

    for r in 1..world_size {
        let rank = Rank::new(r);
        let (to_worker, worker_inbox) = unbounded();
        let (to_coordinator, coordinator_inbox) = unbounded();

        coordinator.peers.insert(
            rank,
            ChannelLink {
                tx: to_worker,
                rx: coordinator_inbox,
            },
        );

        let mut peers = AddressBook::new();
        peers.insert(
            Rank::COORDINATOR,
            ChannelLink {
                tx: to_coordinator,
                rx: worker_inbox,
            },
        );
        workers.push(ChannelTransport { rank, peers });
    }

    let mut mesh = Vec::with_capacity(world_size as usize);
    mesh.push(coordinator);
    mesh.extend(workers);
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::messages::Command;
    use crate::count_table::CountTable;
    use std::time::Instant;

    #[test]
    fn test_mesh_shape() {
        let mesh = channel_mesh(4);
        assert_eq!(mesh.len(), 4);
        assert_eq!(
            mesh[0].peers().ranks().collect::<Vec<_>>(),
            vec![Rank::new(1), Rank::new(2), Rank::new(3)]
        );
        for (i, worker) in mesh.iter().enumerate().skip(1) {
            assert_eq!(worker.rank(), Rank::new(i as u32));
            assert_eq!(worker.peers().ranks().collect::<Vec<_>>(), vec![Rank::COORDINATOR]);
        }
        assert_eq!(channel_mesh(1).len(), 1);
    }

    #[test]
    fn test_fifo_per_channel() {
        let mut mesh = channel_mesh(2);
        let mut worker = mesh.pop().unwrap();
        let mut coordinator = mesh.pop().unwrap();

        coordinator.send(Rank::new(1), Command::ReturnData.into()).unwrap();
        coordinator.send(Rank::new(1), Command::Exit.into()).unwrap();

        let wait = WaitPolicy::unbounded();
        assert_eq!(
            worker.recv(Rank::COORDINATOR, &wait).unwrap(),
            Message::command(Command::ReturnData)
        );
        assert_eq!(
            worker.recv(Rank::COORDINATOR, &wait).unwrap(),
            Message::command(Command::Exit)
        );
    }

    #[test]
    fn test_unknown_rank() {
        let mut mesh = channel_mesh(2);
        let err = mesh[0].send(Rank::new(5), Command::Exit.into()).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRank(r) if r == Rank::new(5)));

        // workers have no route to each other
        let err = mesh[1]
            .recv(Rank::new(1), &WaitPolicy::unbounded())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRank(_)));
    }

    #[test]
    fn test_deadline_times_out() {
        let mut mesh = channel_mesh(2);
        let wait = WaitPolicy::unbounded().with_deadline(Some(Duration::from_millis(20)));

        let started = Instant::now();
        let err = mesh[0].recv(Rank::new(1), &wait).unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(20));
        match err {
            ProtocolError::Timeout { peer, waited } => {
                assert_eq!(peer, Rank::new(1));
                assert_eq!(waited, Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_cancel_keeps_original_deadline() {
        let mut mesh = channel_mesh(2);
        let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();
        let wait = WaitPolicy::unbounded()
            .with_deadline(Some(Duration::from_millis(300)))
            .with_cancel(ctrl_rx);

        let started = Instant::now();
        let dropper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            drop(ctrl_tx);
        });
        let err = mesh[0].recv(Rank::new(1), &wait).unwrap_err();
        dropper.join().unwrap();

        assert!(matches!(err, ProtocolError::Timeout { .. }), "got {:?}", err);
        // a restarted timer would not fire before 500ms
        assert!(started.elapsed() < Duration::from_millis(480), "took {:?}", started.elapsed());
    }

    #[test]
    fn test_cancel_interrupts_receive() {
        let mut mesh = channel_mesh(2);
        let (ctrl_tx, ctrl_rx) = unbounded();
        ctrl_tx.send(Ctrl::Shutdown).unwrap();

        let wait = WaitPolicy::unbounded().with_cancel(ctrl_rx);
        let err = mesh[0].recv(Rank::new(1), &wait).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_dropped_cancel_sender_does_not_cancel() {
        let mut mesh = channel_mesh(2);
        let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();
        drop(ctrl_tx);

        let wait = WaitPolicy::unbounded()
            .with_cancel(ctrl_rx)
            .with_deadline(Some(Duration::from_millis(10)));
        let err = mesh[0].recv(Rank::new(1), &wait).unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout { .. }));
    }

    #[test]
    fn test_peer_hangup_is_disconnect() {
        let mut mesh = channel_mesh(2);
        let worker = mesh.pop().unwrap();
        drop(worker);

        let err = mesh[0]
            .recv(Rank::new(1), &WaitPolicy::unbounded())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Disconnected(r) if r == Rank::new(1)));
        assert!(matches!(
            mesh[0].send(Rank::new(1), Command::Exit.into()),
            Err(ProtocolError::Disconnected(_))
        ));
    }

    #[test]
    fn test_counts_reach_coordinator() {
        let mut mesh = channel_mesh(3);
        let table = CountTable::from(vec![("#x", 2)]);
        mesh[2]
            .send(Rank::COORDINATOR, Message::Counts { table: table.clone() })
            .unwrap();

        let got = mesh[0].recv(Rank::new(2), &WaitPolicy::unbounded()).unwrap();
        assert_eq!(got, Message::Counts { table });
    }
}
