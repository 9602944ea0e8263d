//! Direct-to-buffer reply serialization and request encoding.
//!
//! Writes frames straight into a `BytesMut` with no intermediate
//! allocations. Integer-to-string conversion uses `itoa` for fast
//! stack-based formatting.

use bytes::{BufMut, Bytes, BytesMut};

use crate::reply::Reply;

impl Reply {
    /// Serializes this reply into the provided buffer, including the
    /// type prefix and trailing `\r\n` delimiters.
    pub fn write(&self, dst: &mut BytesMut) {
        match self {
            Reply::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                dst.put_u8(b':');
                put_i64(*n, dst);
                dst.put_slice(b"\r\n");
            }
            Reply::Bulk(data) => {
                dst.put_u8(b'$');
                put_i64(data.len() as i64, dst);
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Reply::Nil => {
                dst.put_slice(b"$-1\r\n");
            }
            Reply::Array(items) => {
                dst.put_u8(b'*');
                put_i64(items.len() as i64, dst);
                dst.put_slice(b"\r\n");
                for item in items {
                    item.write(dst);
                }
            }
        }
    }

    /// Convenience wrapper: serializes into a fresh frozen buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write(&mut buf);
        buf.freeze()
    }
}

/// Encodes an argument vector as a request frame — an array of bulk
/// strings, byte-identical to what a client would send. This is the
/// wire form appended to the journal and fanned out to replicas.
pub fn encode_request(argv: &[Bytes], dst: &mut BytesMut) {
    dst.put_u8(b'*');
    put_i64(argv.len() as i64, dst);
    dst.put_slice(b"\r\n");
    for arg in argv {
        dst.put_u8(b'$');
        put_i64(arg.len() as i64, dst);
        dst.put_slice(b"\r\n");
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

/// Writes an i64 as decimal ASCII directly into the buffer.
fn put_i64(val: i64, dst: &mut BytesMut) {
    let mut buf = itoa::Buffer::new();
    dst.put_slice(buf.format(val).as_bytes());
}
