//! Wall-clock time helper.
//!
//! Expirations are stored as absolute Unix-epoch seconds so they stay
//! meaningful across snapshot save/load and process restarts — a
//! monotonic clock would not survive either.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
