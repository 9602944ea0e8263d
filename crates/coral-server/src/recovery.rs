//! Journal replay at startup.
//!
//! Reads the journal file and re-applies every recognized write verb
//! to database 0 through the same store operations the dispatcher
//! uses. The journal carries no database index, so writes made against
//! other databases are not recoverable — only database 0 replays.
//!
//! EXPIRE frames are replayed verbatim: the TTL restarts from replay
//! time, not from when the command originally ran.

use std::io;
use std::path::Path;

use coral_core::Store;
use coral_persistence::journal;
use coral_protocol::Command;
use tracing::debug;

/// Applies the journal at `path` to database 0 of `store`. Returns how
/// many commands were applied. A missing journal applies nothing.
pub fn replay(store: &Store, path: &Path) -> io::Result<usize> {
    let frames = journal::read_frames(path)?;
    let mut applied = 0;

    for argv in &frames {
        match Command::resolve(argv) {
            Ok(Command::Set { key, value }) => {
                store.db(0).set(key, value);
                applied += 1;
            }
            Ok(Command::Del { key }) => {
                store.db(0).del(&key);
                applied += 1;
            }
            Ok(Command::Expire { key, seconds }) => {
                store.db(0).expire(&key, seconds);
                applied += 1;
            }
            Ok(Command::HSet { key, field, value }) => {
                if store.db(0).hset(&key, field, value).is_ok() {
                    applied += 1;
                }
            }
            // anything else in the file is not a journaled verb — skip
            Ok(other) => debug!("skipping non-journaled frame: {other:?}"),
            Err(e) => debug!("skipping malformed journal frame: {e}"),
        }
    }

    Ok(applied)
}
