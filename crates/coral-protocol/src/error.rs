//! Protocol error types for request parsing.

use thiserror::Error;

/// Errors that can occur when parsing the request wire format.
///
/// The `Display` text of each variant is the exact error line sent back
/// to the client (without the leading `-` or trailing CRLF).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame didn't start with the `*` array marker.
    #[error("ERR expected array")]
    ExpectedArray,

    /// An array element didn't start with the `$` bulk marker.
    #[error("ERR expected bulk string")]
    ExpectedBulk,

    /// The array count or a bulk length wasn't a valid decimal integer,
    /// or the array count was negative.
    #[error("ERR invalid array length")]
    InvalidLength,
}
