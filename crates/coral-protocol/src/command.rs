//! Command resolution from parsed argument vectors.
//!
//! Converts the argv of a decoded request frame into a typed
//! [`Command`]. This keeps wire-level concerns out of the store and
//! gives the dispatcher a single enum to match on. Resolution is
//! case-insensitive on the verb; unrecognized verbs become
//! [`Command::Unknown`] so the dispatcher can report them by name.

use bytes::Bytes;
use thiserror::Error;

/// An argument-level error: wrong arity or an unparseable argument.
///
/// The `Display` text is the exact error line sent to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Too few (or too many) arguments for the verb.
    #[error("{0}")]
    Arity(&'static str),

    /// An argument that must be numeric was not.
    #[error("{0}")]
    Invalid(&'static str),
}

/// A resolved client command, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PING. Replies PONG.
    Ping,

    /// ECHO <message>.
    Echo { message: Bytes },

    /// SET <key> <value>. Overwrites any prior value and clears the TTL.
    Set { key: Bytes, value: Bytes },

    /// GET <key>.
    Get { key: Bytes },

    /// DEL <key>. Replies 1 if the key was removed.
    Del { key: Bytes },

    /// EXISTS <key>.
    Exists { key: Bytes },

    /// KEYS * — lists every live key. Only the `*` pattern is accepted.
    Keys,

    /// EXPIRE <key> <seconds>. Sets an absolute expiry of now + seconds.
    Expire { key: Bytes, seconds: i64 },

    /// TTL <key>. -2 when absent, -1 without expiry, else seconds left.
    Ttl { key: Bytes },

    /// MGET <key> [key ...].
    MGet { keys: Vec<Bytes> },

    /// INCR / DECR / INCRBY / DECRBY, normalized to a signed delta.
    IncrBy { key: Bytes, delta: i64 },

    /// APPEND <key> <value>. Replies with the new length.
    Append { key: Bytes, value: Bytes },

    /// STRLEN <key>.
    StrLen { key: Bytes },

    /// HSET <key> <field> <value>. Replies 1 for a new field, 0 for an update.
    HSet { key: Bytes, field: Bytes, value: Bytes },

    /// HGET <key> <field>.
    HGet { key: Bytes, field: Bytes },

    /// SELECT <index>. Switches the session's database.
    Select { index: i64 },

    /// INFO — server statistics as a bulk string.
    Info,

    /// SAVE — snapshot the session's database to disk.
    Save,

    /// LOAD — replace the session's database from the snapshot file.
    Load,

    /// AUTH — accepted unconditionally; marks the session authenticated.
    Auth,

    /// SUBSCRIBE <channel> [channel ...].
    Subscribe { channels: Vec<Bytes> },

    /// PUBLISH <channel> <message>.
    Publish { channel: Bytes, message: Bytes },

    /// EVAL — always rejected; there is no scripting engine.
    Eval,

    /// QUIT — reply OK, then close the connection.
    Quit,

    /// Anything else. Carries the verb as received (upper-cased).
    Unknown(String),
}

impl Command {
    /// Resolves an argument vector into a command.
    ///
    /// `argv[0]` is the verb; matching is case-insensitive. The caller
    /// is expected to skip empty argvs (an empty request frame is a
    /// no-op at the dispatch layer).
    pub fn resolve(argv: &[Bytes]) -> Result<Command, CommandError> {
        let verb = match argv.first() {
            Some(v) => String::from_utf8_lossy(v).to_ascii_uppercase(),
            None => return Ok(Command::Unknown(String::new())),
        };
        let args = &argv[1..];

        match verb.as_str() {
            "PING" => Ok(Command::Ping),
            "ECHO" => {
                let message = require(args, 0, "ECHO requires a message")?;
                Ok(Command::Echo { message })
            }
            "SET" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("SET requires key and value"));
                }
                Ok(Command::Set {
                    key: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "GET" => {
                let key = require(args, 0, "GET requires a key")?;
                Ok(Command::Get { key })
            }
            "DEL" => {
                let key = require(args, 0, "DEL requires a key")?;
                Ok(Command::Del { key })
            }
            "EXISTS" => {
                let key = require(args, 0, "EXISTS requires a key")?;
                Ok(Command::Exists { key })
            }
            "KEYS" => {
                if args.first().map(|p| p.as_ref()) != Some(b"*".as_slice()) {
                    return Err(CommandError::Arity("KEYS only supports wildcard *"));
                }
                Ok(Command::Keys)
            }
            "EXPIRE" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("EXPIRE requires key and seconds"));
                }
                let seconds = parse_i64(&args[1], "Invalid seconds value")?;
                Ok(Command::Expire {
                    key: args[0].clone(),
                    seconds,
                })
            }
            "TTL" => {
                let key = require(args, 0, "TTL requires a key")?;
                Ok(Command::Ttl { key })
            }
            "MGET" => {
                if args.is_empty() {
                    return Err(CommandError::Arity("MGET requires at least one key"));
                }
                Ok(Command::MGet {
                    keys: args.to_vec(),
                })
            }
            "INCR" => {
                let key = require(args, 0, "INCR requires a key")?;
                Ok(Command::IncrBy { key, delta: 1 })
            }
            "DECR" => {
                let key = require(args, 0, "DECR requires a key")?;
                Ok(Command::IncrBy { key, delta: -1 })
            }
            "INCRBY" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("INCRBY requires key and increment"));
                }
                let delta = parse_i64(&args[1], "ERR value is not an integer")?;
                Ok(Command::IncrBy {
                    key: args[0].clone(),
                    delta,
                })
            }
            "DECRBY" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("DECRBY requires key and decrement"));
                }
                let delta = parse_i64(&args[1], "ERR value is not an integer")?
                    .checked_neg()
                    .ok_or(CommandError::Invalid(
                        "ERR increment or decrement would overflow",
                    ))?;
                Ok(Command::IncrBy {
                    key: args[0].clone(),
                    delta,
                })
            }
            "APPEND" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("APPEND requires key and value"));
                }
                Ok(Command::Append {
                    key: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "STRLEN" => {
                let key = require(args, 0, "STRLEN requires a key")?;
                Ok(Command::StrLen { key })
            }
            "HSET" => {
                if args.len() < 3 {
                    return Err(CommandError::Arity("HSET requires key, field, and value"));
                }
                Ok(Command::HSet {
                    key: args[0].clone(),
                    field: args[1].clone(),
                    value: args[2].clone(),
                })
            }
            "HGET" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("HGET requires key and field"));
                }
                Ok(Command::HGet {
                    key: args[0].clone(),
                    field: args[1].clone(),
                })
            }
            "SELECT" => {
                let raw = require(args, 0, "SELECT requires database number")?;
                let index = parse_i64(&raw, "Invalid database number")?;
                Ok(Command::Select { index })
            }
            "INFO" => Ok(Command::Info),
            "SAVE" => Ok(Command::Save),
            "LOAD" => Ok(Command::Load),
            "AUTH" => Ok(Command::Auth),
            "SUBSCRIBE" => {
                if args.is_empty() {
                    return Err(CommandError::Arity("SUBSCRIBE requires channel name"));
                }
                Ok(Command::Subscribe {
                    channels: args.to_vec(),
                })
            }
            "PUBLISH" => {
                if args.len() < 2 {
                    return Err(CommandError::Arity("PUBLISH requires channel and message"));
                }
                Ok(Command::Publish {
                    channel: args[0].clone(),
                    message: args[1].clone(),
                })
            }
            "EVAL" => Ok(Command::Eval),
            "QUIT" => Ok(Command::Quit),
            _ => Ok(Command::Unknown(verb)),
        }
    }

    /// Returns `true` if this command mutates the keyspace in a way that
    /// is journaled and replicated. DEL and EXPIRE are conditional — the
    /// dispatcher only records them when they actually applied.
    pub fn is_journaled(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Del { .. }
                | Command::Expire { .. }
                | Command::HSet { .. }
        )
    }
}

/// Fetches a required positional argument or fails with the given text.
fn require(args: &[Bytes], idx: usize, msg: &'static str) -> Result<Bytes, CommandError> {
    args.get(idx).cloned().ok_or(CommandError::Arity(msg))
}

/// Parses an argument as a signed 64-bit decimal.
fn parse_i64(arg: &Bytes, msg: &'static str) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::Invalid(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&[u8]]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p)).collect()
    }

    fn resolve(parts: &[&[u8]]) -> Result<Command, CommandError> {
        Command::resolve(&argv(parts))
    }

    #[test]
    fn ping() {
        assert_eq!(resolve(&[b"PING"]).unwrap(), Command::Ping);
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(resolve(&[b"ping"]).unwrap(), Command::Ping);
        assert_eq!(resolve(&[b"Ping"]).unwrap(), Command::Ping);
        assert!(matches!(
            resolve(&[b"get", b"k"]).unwrap(),
            Command::Get { .. }
        ));
    }

    #[test]
    fn echo_requires_message() {
        assert_eq!(
            resolve(&[b"ECHO"]).unwrap_err().to_string(),
            "ECHO requires a message"
        );
        assert_eq!(
            resolve(&[b"ECHO", b"hi"]).unwrap(),
            Command::Echo {
                message: Bytes::from_static(b"hi")
            }
        );
    }

    #[test]
    fn set_arity() {
        assert_eq!(
            resolve(&[b"SET", b"k"]).unwrap_err().to_string(),
            "SET requires key and value"
        );
    }

    #[test]
    fn keys_only_star() {
        assert_eq!(resolve(&[b"KEYS", b"*"]).unwrap(), Command::Keys);
        assert_eq!(
            resolve(&[b"KEYS", b"user:*"]).unwrap_err().to_string(),
            "KEYS only supports wildcard *"
        );
        assert_eq!(
            resolve(&[b"KEYS"]).unwrap_err().to_string(),
            "KEYS only supports wildcard *"
        );
    }

    #[test]
    fn expire_parses_seconds() {
        assert_eq!(
            resolve(&[b"EXPIRE", b"k", b"60"]).unwrap(),
            Command::Expire {
                key: Bytes::from_static(b"k"),
                seconds: 60
            }
        );
        assert_eq!(
            resolve(&[b"EXPIRE", b"k", b"soon"]).unwrap_err().to_string(),
            "Invalid seconds value"
        );
        assert_eq!(
            resolve(&[b"EXPIRE", b"k"]).unwrap_err().to_string(),
            "EXPIRE requires key and seconds"
        );
    }

    #[test]
    fn incr_decr_normalize_to_delta() {
        assert_eq!(
            resolve(&[b"INCR", b"k"]).unwrap(),
            Command::IncrBy {
                key: Bytes::from_static(b"k"),
                delta: 1
            }
        );
        assert_eq!(
            resolve(&[b"DECR", b"k"]).unwrap(),
            Command::IncrBy {
                key: Bytes::from_static(b"k"),
                delta: -1
            }
        );
        assert_eq!(
            resolve(&[b"INCRBY", b"k", b"17"]).unwrap(),
            Command::IncrBy {
                key: Bytes::from_static(b"k"),
                delta: 17
            }
        );
        // DECRBY with a negative delta is an increment
        assert_eq!(
            resolve(&[b"DECRBY", b"k", b"-5"]).unwrap(),
            Command::IncrBy {
                key: Bytes::from_static(b"k"),
                delta: 5
            }
        );
    }

    #[test]
    fn incrby_rejects_garbage_delta() {
        assert_eq!(
            resolve(&[b"INCRBY", b"k", b"ten"]).unwrap_err().to_string(),
            "ERR value is not an integer"
        );
        assert_eq!(
            resolve(&[b"INCRBY", b"k", b" 1"]).unwrap_err().to_string(),
            "ERR value is not an integer"
        );
    }

    #[test]
    fn decrby_min_delta_overflows() {
        let min = i64::MIN.to_string();
        assert_eq!(
            resolve(&[b"DECRBY", b"k", min.as_bytes()])
                .unwrap_err()
                .to_string(),
            "ERR increment or decrement would overflow"
        );
    }

    #[test]
    fn mget_needs_a_key() {
        assert_eq!(
            resolve(&[b"MGET"]).unwrap_err().to_string(),
            "MGET requires at least one key"
        );
        assert_eq!(
            resolve(&[b"MGET", b"a", b"b"]).unwrap(),
            Command::MGet {
                keys: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
            }
        );
    }

    #[test]
    fn hset_arity() {
        assert_eq!(
            resolve(&[b"HSET", b"k", b"f"]).unwrap_err().to_string(),
            "HSET requires key, field, and value"
        );
        assert!(matches!(
            resolve(&[b"HSET", b"k", b"f", b"v"]).unwrap(),
            Command::HSet { .. }
        ));
    }

    #[test]
    fn select_parses_index() {
        assert_eq!(resolve(&[b"SELECT", b"3"]).unwrap(), Command::Select { index: 3 });
        assert_eq!(
            resolve(&[b"SELECT", b"three"]).unwrap_err().to_string(),
            "Invalid database number"
        );
        assert_eq!(
            resolve(&[b"SELECT"]).unwrap_err().to_string(),
            "SELECT requires database number"
        );
    }

    #[test]
    fn subscribe_publish() {
        assert_eq!(
            resolve(&[b"SUBSCRIBE", b"news", b"sports"]).unwrap(),
            Command::Subscribe {
                channels: vec![Bytes::from_static(b"news"), Bytes::from_static(b"sports")]
            }
        );
        assert_eq!(
            resolve(&[b"SUBSCRIBE"]).unwrap_err().to_string(),
            "SUBSCRIBE requires channel name"
        );
        assert_eq!(
            resolve(&[b"PUBLISH", b"news"]).unwrap_err().to_string(),
            "PUBLISH requires channel and message"
        );
    }

    #[test]
    fn unknown_carries_verb() {
        assert_eq!(
            resolve(&[b"FLUSHALL"]).unwrap(),
            Command::Unknown("FLUSHALL".into())
        );
    }

    #[test]
    fn empty_argv_is_unknown() {
        assert_eq!(Command::resolve(&[]).unwrap(), Command::Unknown(String::new()));
    }

    #[test]
    fn journal_predicate() {
        assert!(resolve(&[b"SET", b"k", b"v"]).unwrap().is_journaled());
        assert!(resolve(&[b"DEL", b"k"]).unwrap().is_journaled());
        assert!(resolve(&[b"EXPIRE", b"k", b"9"]).unwrap().is_journaled());
        assert!(resolve(&[b"HSET", b"k", b"f", b"v"]).unwrap().is_journaled());

        assert!(!resolve(&[b"INCR", b"k"]).unwrap().is_journaled());
        assert!(!resolve(&[b"APPEND", b"k", b"v"]).unwrap().is_journaled());
        assert!(!resolve(&[b"GET", b"k"]).unwrap().is_journaled());
    }
}
