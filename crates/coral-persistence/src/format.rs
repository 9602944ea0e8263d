//! Binary format primitives for the snapshot file.
//!
//! All multi-byte integers are little-endian for portability across
//! hosts sharing a data directory.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Errors reading or writing the snapshot format.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("unknown value type tag: {0}")]
    UnknownType(u8),

    #[error("declared field length {0} exceeds maximum")]
    FieldTooLarge(usize),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Maximum length accepted for a length-prefixed field. A corrupt
/// length prefix must not trigger a multi-gigabyte allocation.
pub const MAX_FIELD_LEN: usize = 512 * 1024 * 1024;

pub fn write_u8(w: &mut impl Write, val: u8) -> io::Result<()> {
    w.write_all(&[val])
}

pub fn write_u32(w: &mut impl Write, val: u32) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

pub fn write_i64(w: &mut impl Write, val: i64) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

/// Writes a length-prefixed byte slice: `[len: u32][data]`.
pub fn write_bytes(w: &mut impl Write, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("data length {} exceeds u32::MAX", data.len()),
        )
    })?;
    write_u32(w, len)?;
    w.write_all(data)
}

pub fn read_u8(r: &mut impl Read) -> Result<u8, FormatError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

pub fn read_u32(r: &mut impl Read) -> Result<u32, FormatError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64(r: &mut impl Read) -> Result<i64, FormatError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads a length-prefixed byte vector: `[len: u32][data]`.
pub fn read_bytes(r: &mut impl Read) -> Result<Vec<u8>, FormatError> {
    let len = read_u32(r)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(FormatError::FieldTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Reads exactly `buf.len()` bytes, mapping a short read to
/// [`FormatError::UnexpectedEof`].
fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> Result<(), FormatError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::UnexpectedEof
        } else {
            FormatError::Io(e)
        }
    })
}
