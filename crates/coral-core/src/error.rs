//! Store error types.
//!
//! The `Display` text of each error is the exact line sent back to the
//! client, so handlers can forward them without reformatting.

const WRONGTYPE_MSG: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// A command was used against a key holding the other value variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongType;

impl std::fmt::Display for WrongType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{WRONGTYPE_MSG}")
    }
}

impl std::error::Error for WrongType {}

/// Errors from the counter commands (INCR/DECR/INCRBY/DECRBY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError {
    /// The key holds a hash.
    WrongType,
    /// The stored string is not a well-formed signed 64-bit decimal.
    NotAnInteger,
    /// The arithmetic would leave the i64 range.
    Overflow,
}

impl std::fmt::Display for CounterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterError::WrongType => write!(f, "{WRONGTYPE_MSG}"),
            CounterError::NotAnInteger => write!(f, "ERR value is not an integer"),
            CounterError::Overflow => write!(f, "ERR increment or decrement would overflow"),
        }
    }
}

impl std::error::Error for CounterError {}

impl From<WrongType> for CounterError {
    fn from(_: WrongType) -> Self {
        CounterError::WrongType
    }
}
