//! coral-protocol: the wire codec and command model.
//!
//! Requests are arrays of length-prefixed bulk strings; replies are one
//! of five shapes (simple string, error, integer, bulk, array). The
//! parser is incremental and binary-safe; the serializer writes directly
//! into a `BytesMut` with no intermediate allocations.

pub mod command;
pub mod error;
pub mod parse;
pub mod reply;
pub mod serialize;

pub use command::{Command, CommandError};
pub use error::ProtocolError;
pub use parse::{parse_request, resync};
pub use reply::Reply;
pub use serialize::encode_request;
