//! Shared server state.
//!
//! One [`ServerContext`] value owns everything the handlers touch: the
//! store, the pub/sub registry, the replica list, the journal producer
//! handle, and the server-wide counters. Handlers receive it as an
//! `Arc` — there are no process globals, so tests can stand up as many
//! independent servers as they like.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use coral_core::Store;
use coral_persistence::JournalHandle;

use crate::config::Config;
use crate::pubsub::PubSub;
use crate::replication::Replicator;

/// Everything shared across connections.
#[derive(Debug)]
pub struct ServerContext {
    pub store: Store,
    pub pubsub: PubSub,
    pub replicas: Replicator,
    /// Producer side of the journal queue; `None` runs without a journal.
    pub journal: Option<JournalHandle>,
    pub rdb_path: PathBuf,
    commands_processed: AtomicU64,
    started_at: Instant,
    next_conn_id: AtomicU64,
}

impl ServerContext {
    /// Builds the context for a configuration. The journal handle is
    /// attached separately once the journal is open.
    pub fn new(config: &Config) -> Self {
        Self {
            store: Store::new(config.max_keys),
            pubsub: PubSub::new(),
            replicas: Replicator::new(),
            journal: None,
            rdb_path: config.rdb_path.clone(),
            commands_processed: AtomicU64::new(0),
            started_at: Instant::now(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Counts one dispatched command.
    pub fn count_command(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total commands dispatched since startup.
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    /// Seconds since the context was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Hands out a fresh connection id.
    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }
}
