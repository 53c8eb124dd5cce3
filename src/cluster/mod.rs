//! Coordinator/worker protocol over rank-addressed links
//!
//! Rank 0 is the coordinator; ranks `1..N` are workers. Every rank counts
//! its own round-robin slice of the input. The coordinator then asks each
//! worker for its table with `return_data`, merges the replies in rank
//! order, and finally sends `exit` to every worker.

pub mod coordinator;
pub mod launcher;
pub mod messages;
pub mod process;
pub mod transport;
pub mod worker;

pub use coordinator::Coordinator;
pub use launcher::{run_processes, run_threads, run_worker_process};
pub use messages::{Command, Envelope, Message};
pub use process::{ProcessTransport, StdioTransport};
pub use transport::{channel_mesh, AddressBook, ChannelTransport, Transport, WaitPolicy};
pub use worker::{Step, WorkerAgent, WorkerExit};
