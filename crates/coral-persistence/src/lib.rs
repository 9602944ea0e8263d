//! coral-persistence: durable formats.
//!
//! Two independent mechanisms: a binary snapshot of one database's
//! contents (dump/restore, TTLs included), and an append-only journal
//! of write commands in their request wire form, replayed at startup.

pub mod format;
pub mod journal;
pub mod snapshot;

pub use format::FormatError;
pub use journal::{Journal, JournalHandle};
pub use snapshot::{SnapValue, SnapshotEntry};
