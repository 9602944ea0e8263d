//! coral-server: the network-facing server.
//!
//! Composes the codec, store, and persistence layers into a TCP server:
//! configuration, the per-connection dispatcher, the listener drivers,
//! the pub/sub registry, and the replication fan-out.

pub mod config;
pub mod connection;
pub mod context;
pub mod listener;
pub mod pubsub;
pub mod recovery;
pub mod replication;

pub use config::Config;
pub use context::ServerContext;
