//! A single replica of a quorum-replicated store, plus the helpers the
//! surrounding tooling uses to wait on people and peers.
//!
//! - [`node`] holds the replica's data behind a reader-writer lock and owns
//!   the lifecycle of the TCP server that exposes it.
//! - `server` is the accept loop and per-connection request dispatch.
//! - [`message`] provides the JSON line protocol plus helpers for async
//!   reads and writes.
//! - [`client`] talks that protocol to a node.
//! - [`answer`] races a single-answer channel against a deadline.
//! - [`prompt`] reads menu selections from a terminal and feeds them into an
//!   answer channel.
//! - [`liveness`] is the UDP ping/pong liveness check and its responder.
//! - [`cli`] parses the command-line interface of the `storage_node` binary.
//!
//! The quorum layer that fans requests out across replicas is not part of
//! this crate; it talks to each node through [`client::StorageClient`] or the
//! wire protocol directly.

pub mod answer;
pub mod cli;
pub mod client;
pub mod liveness;
pub mod message;
pub mod node;
pub mod prompt;
mod server;
