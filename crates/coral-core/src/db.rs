//! A single database: one keyspace with expiry and LRU bookkeeping.
//!
//! Expired keys are removed lazily when an operation touches them.
//! Every operation that hits a live key — reads included — promotes it
//! to the front of the recency list, and every write ends by evicting
//! recency tails until the keyspace is back under its size bound. A
//! write is only observable with all three structures (entries, expiry
//! table, recency list) already consistent, since the owning store
//! serializes access per database.

use ahash::AHashMap;
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CounterError, WrongType};
use crate::recency::RecencyList;
use crate::time;
use crate::value::Value;

/// Remaining time-to-live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist (reported to clients as -2).
    Missing,
    /// The key exists without an expiry (reported as -1).
    NoExpiry,
    /// Seconds until expiry.
    Remaining(i64),
}

impl Ttl {
    /// The integer a client sees for this TTL state.
    pub fn as_reply(self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::NoExpiry => -1,
            Ttl::Remaining(secs) => secs,
        }
    }
}

/// One keyspace: value map, expiration table, recency list.
#[derive(Debug)]
pub struct Db {
    entries: AHashMap<Bytes, Value>,
    expires: AHashMap<Bytes, i64>,
    recency: RecencyList,
    max_keys: usize,
}

impl Db {
    /// Creates an empty database bounded at `max_keys` live keys.
    pub fn new(max_keys: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            expires: AHashMap::new(),
            recency: RecencyList::new(),
            max_keys,
        }
    }

    /// Number of stored keys (expired-but-unprobed keys included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores a string value, overwriting any prior value of either
    /// variant and clearing any TTL.
    pub fn set(&mut self, key: Bytes, value: Bytes) {
        self.probe_expire(&key, time::now_secs());
        self.entries.insert(key.clone(), Value::Str(value));
        self.expires.remove(&key);
        self.recency.touch(&key);
        self.evict_excess();
    }

    /// Fetches a string value. A hash at the key is a type error.
    pub fn get(&mut self, key: &Bytes) -> Result<Option<Bytes>, WrongType> {
        self.probe_expire(key, time::now_secs());
        match self.entries.get(key) {
            Some(Value::Str(data)) => {
                let out = data.clone();
                self.recency.touch(key);
                Ok(Some(out))
            }
            Some(Value::Hash(_)) => Err(WrongType),
            None => Ok(None),
        }
    }

    /// MGET semantics for one key: wrong-type reads as nil, not an error.
    pub fn get_or_nil(&mut self, key: &Bytes) -> Option<Bytes> {
        self.get(key).ok().flatten()
    }

    /// Removes a key. Returns `true` if a live key was removed.
    pub fn del(&mut self, key: &Bytes) -> bool {
        self.probe_expire(key, time::now_secs());
        self.remove_entry(key)
    }

    /// Whether a live key exists. Counts as a read for recency.
    pub fn exists(&mut self, key: &Bytes) -> bool {
        self.probe_expire(key, time::now_secs());
        if self.entries.contains_key(key) {
            self.recency.touch(key);
            true
        } else {
            false
        }
    }

    /// All live keys, in no particular order. Expired keys encountered
    /// during the scan are removed.
    pub fn keys(&mut self) -> Vec<Bytes> {
        let now = time::now_secs();
        let dead: Vec<Bytes> = self
            .expires
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            self.remove_entry(key);
        }
        self.entries.keys().cloned().collect()
    }

    /// Sets an absolute expiry of now + `seconds`. Returns `false` when
    /// the key doesn't exist (nothing is applied).
    pub fn expire(&mut self, key: &Bytes, seconds: i64) -> bool {
        let now = time::now_secs();
        self.probe_expire(key, now);
        if !self.entries.contains_key(key) {
            return false;
        }
        self.expires.insert(key.clone(), now.saturating_add(seconds));
        self.recency.touch(key);
        true
    }

    /// Remaining TTL of a key.
    pub fn ttl(&mut self, key: &Bytes) -> Ttl {
        let now = time::now_secs();
        self.probe_expire(key, now);
        if !self.entries.contains_key(key) {
            return Ttl::Missing;
        }
        match self.expires.get(key) {
            Some(&at) => Ttl::Remaining(at - now),
            None => Ttl::NoExpiry,
        }
    }

    /// Adds `delta` to the counter at `key`, treating a missing key as 0.
    ///
    /// The stored string must be exactly the decimal text of a signed
    /// 64-bit integer — no whitespace, no sign-only forms, no leading
    /// zeros. The result is stored back as decimal text.
    pub fn incr_by(&mut self, key: &Bytes, delta: i64) -> Result<i64, CounterError> {
        self.probe_expire(key, time::now_secs());
        let current = match self.entries.get(key) {
            Some(Value::Str(data)) => parse_counter(data)?,
            Some(Value::Hash(_)) => return Err(CounterError::WrongType),
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(CounterError::Overflow)?;
        self.entries
            .insert(key.clone(), Value::Str(Bytes::from(next.to_string())));
        self.recency.touch(key);
        self.evict_excess();
        Ok(next)
    }

    /// Appends bytes to the string at `key`, creating it if absent.
    /// Returns the new length.
    pub fn append(&mut self, key: &Bytes, suffix: &Bytes) -> Result<usize, WrongType> {
        self.probe_expire(key, time::now_secs());
        let new_len = match self.entries.get_mut(key) {
            Some(Value::Str(data)) => {
                let mut joined = BytesMut::with_capacity(data.len() + suffix.len());
                joined.put_slice(data);
                joined.put_slice(suffix);
                *data = joined.freeze();
                data.len()
            }
            Some(Value::Hash(_)) => return Err(WrongType),
            None => {
                self.entries.insert(key.clone(), Value::Str(suffix.clone()));
                suffix.len()
            }
        };
        self.recency.touch(key);
        self.evict_excess();
        Ok(new_len)
    }

    /// Length of the string at `key`; 0 when absent.
    pub fn strlen(&mut self, key: &Bytes) -> Result<usize, WrongType> {
        self.probe_expire(key, time::now_secs());
        match self.entries.get(key) {
            Some(Value::Str(data)) => {
                let len = data.len();
                self.recency.touch(key);
                Ok(len)
            }
            Some(Value::Hash(_)) => Err(WrongType),
            None => Ok(0),
        }
    }

    /// Sets a hash field. Returns `true` if the field was newly created.
    ///
    /// A string at the key is a type error — unlike SET over a hash,
    /// which silently overwrites. The asymmetry is intentional.
    pub fn hset(&mut self, key: &Bytes, field: Bytes, value: Bytes) -> Result<bool, WrongType> {
        self.probe_expire(key, time::now_secs());
        let created = match self.entries.get_mut(key) {
            Some(Value::Hash(fields)) => fields.insert(field, value).is_none(),
            Some(Value::Str(_)) => return Err(WrongType),
            None => {
                let mut fields = AHashMap::new();
                fields.insert(field, value);
                self.entries.insert(key.clone(), Value::Hash(fields));
                true
            }
        };
        self.recency.touch(key);
        self.evict_excess();
        Ok(created)
    }

    /// Fetches a hash field.
    pub fn hget(&mut self, key: &Bytes, field: &Bytes) -> Result<Option<Bytes>, WrongType> {
        self.probe_expire(key, time::now_secs());
        match self.entries.get(key) {
            Some(Value::Hash(fields)) => {
                let out = fields.get(field).cloned();
                self.recency.touch(key);
                Ok(out)
            }
            Some(Value::Str(_)) => Err(WrongType),
            None => Ok(None),
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.expires.clear();
        self.recency.clear();
    }

    /// Materializes the live contents for a snapshot: `(key, value,
    /// absolute expiry seconds)` with 0 meaning no expiry. Expired
    /// entries are purged rather than dumped.
    pub fn snapshot(&mut self) -> Vec<(Bytes, Value, i64)> {
        let now = time::now_secs();
        let dead: Vec<Bytes> = self
            .expires
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            self.remove_entry(key);
        }
        self.entries
            .iter()
            .map(|(key, value)| {
                let expiry = self.expires.get(key).copied().unwrap_or(0);
                (key.clone(), value.clone(), expiry)
            })
            .collect()
    }

    /// Replaces the contents from snapshot entries. Entries whose expiry
    /// is already in the past are dropped on the way in.
    pub fn restore(&mut self, entries: Vec<(Bytes, Value, i64)>) {
        let now = time::now_secs();
        self.clear();
        for (key, value, expiry) in entries {
            if expiry != 0 && expiry <= now {
                continue;
            }
            self.entries.insert(key.clone(), value);
            if expiry != 0 {
                self.expires.insert(key.clone(), expiry);
            }
            self.recency.touch(&key);
        }
        self.evict_excess();
    }

    /// Removes the key if its TTL has passed.
    fn probe_expire(&mut self, key: &Bytes, now: i64) {
        if let Some(&at) = self.expires.get(key) {
            if at <= now {
                self.remove_entry(key);
            }
        }
    }

    /// Removes value, TTL entry, and recency node together.
    fn remove_entry(&mut self, key: &Bytes) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.expires.remove(key);
        self.recency.remove(key);
        removed
    }

    /// Evicts recency tails until the keyspace is within bounds.
    fn evict_excess(&mut self) {
        while self.entries.len() > self.max_keys {
            match self.recency.pop_tail() {
                Some(victim) => {
                    self.entries.remove(&victim);
                    self.expires.remove(&victim);
                }
                None => break,
            }
        }
    }
}

/// Strict counter parse: the bytes must round-trip through
/// integer → decimal. Rejects empty input, whitespace, `+` signs,
/// sign-only forms, and leading zeros.
fn parse_counter(data: &Bytes) -> Result<i64, CounterError> {
    let text = std::str::from_utf8(data).map_err(|_| CounterError::NotAnInteger)?;
    let value: i64 = text.parse().map_err(|_| CounterError::NotAnInteger)?;
    if value.to_string() != text {
        return Err(CounterError::NotAnInteger);
    }
    Ok(value)
}
