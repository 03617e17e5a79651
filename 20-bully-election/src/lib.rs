//! Bully leader election over plain TCP.
//!
//! A fixed group of processes, each with a unique numeric id and a known
//! address, agrees on a single coordinator: the highest id that is still
//! alive. When the coordinator stops answering heartbeats, the survivors run
//! a new election without any outside help.
//!
//! # Architecture
//!
//! Everything runs on the Tokio multi-threaded runtime:
//!
//! - **Listener task**: accepts inbound connections and spawns one bounded
//!   handler task per connection
//! - **Connection handlers**: read one request, reply, and close
//! - **Lifecycle task**: waits out the settle delay, runs the first election,
//!   then becomes the heartbeat-driven failure detector
//! - **Election passes**: transient tasks fanning out `ELEICAO` requests
//!
//! The only shared mutable state is the coordinator id and the in-election
//! flag, guarded by one mutex that is never held across network I/O.
//!
//! # Modules
//!
//! - [`peer`]: static id -> address directory
//! - [`message`]: JSON wire format
//! - [`state`]: guarded coordinator state
//! - [`messenger`]: single bounded request/reply to one peer
//! - [`listener`] and [`dispatcher`]: inbound connections
//! - [`election`]: the election pass and victory announcement
//! - [`monitor`]: failure detector
//! - [`node`]: process composition, start and shutdown
//! - [`config`] and [`cli`]: configuration

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod election;
pub mod listener;
pub mod message;
pub mod messenger;
pub mod monitor;
pub mod node;
pub mod peer;
pub mod state;

pub use config::{NodeConfig, Timings};
pub use message::Message;
pub use monitor::Check;
pub use node::{Node, NodeHandle, Status};
pub use peer::{PeerAddr, PeerDirectory, PeerEntry, Pid};
pub use state::Role;
