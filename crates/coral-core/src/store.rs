//! The store: sixteen independently locked databases.
//!
//! Each database has its own mutex; an operation locks exactly one
//! database for its duration. Sessions address databases by index, so
//! SELECT is a plain field write on the session and never takes a
//! store lock.

use parking_lot::{Mutex, MutexGuard};

use crate::db::Db;

/// Number of databases in a store.
pub const DB_COUNT: usize = 16;

/// The keyspace collection shared by all connections.
#[derive(Debug)]
pub struct Store {
    dbs: Vec<Mutex<Db>>,
}

impl Store {
    /// Creates a store of [`DB_COUNT`] empty databases, each bounded
    /// at `max_keys` live keys.
    pub fn new(max_keys: usize) -> Self {
        let dbs = (0..DB_COUNT).map(|_| Mutex::new(Db::new(max_keys))).collect();
        Self { dbs }
    }

    /// Locks one database. `index` must be below [`DB_COUNT`] — the
    /// dispatcher validates SELECT arguments before they get here.
    pub fn db(&self, index: usize) -> MutexGuard<'_, Db> {
        self.dbs[index].lock()
    }

    /// Total keys across all databases (for INFO).
    pub fn total_keys(&self) -> usize {
        self.dbs.iter().map(|db| db.lock().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn key(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn databases_are_isolated() {
        let store = Store::new(100);
        store.db(0).set(key("k"), key("zero"));
        store.db(1).set(key("k"), key("one"));

        assert_eq!(store.db(0).get(&key("k")).unwrap(), Some(key("zero")));
        assert_eq!(store.db(1).get(&key("k")).unwrap(), Some(key("one")));
        assert_eq!(store.db(2).get(&key("k")).unwrap(), None);
    }

    #[test]
    fn total_keys_sums_all_databases() {
        let store = Store::new(100);
        store.db(0).set(key("a"), key("1"));
        store.db(0).set(key("b"), key("2"));
        store.db(15).set(key("c"), key("3"));
        assert_eq!(store.total_keys(), 3);
    }

    #[test]
    fn concurrent_writers_from_threads() {
        use std::sync::Arc;

        let store = Arc::new(Store::new(10_000));
        let mut handles = Vec::new();
        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let k = Bytes::from(format!("t{t}:k{i}"));
                    store.db(0).set(k.clone(), Bytes::from_static(b"v"));
                    assert!(store.db(0).exists(&k));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.total_keys(), 400);
    }
}
