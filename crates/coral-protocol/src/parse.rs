//! Incremental request parser.
//!
//! Requests are arrays of bulk strings:
//!
//! ```text
//! '*' <count> CRLF ( '$' <len> CRLF <len bytes> CRLF ) × count
//! ```
//!
//! The parser operates on the connection's accumulated read buffer and
//! never consumes it directly — a successful parse reports how many
//! bytes the frame occupied so the caller can advance. A buffer that
//! ends mid-frame yields `Ok(None)` and the caller retries once more
//! data arrives, so partial reads at any byte boundary are safe.
//!
//! Two historical quirks are load-bearing and deliberately preserved:
//! a negative bulk length decodes to an empty byte string placeholder
//! (parsing continues), and the first element of a completed frame is
//! normalized to upper-case ASCII so verb lookup is case-insensitive.

use bytes::Bytes;

use crate::error::ProtocolError;

/// Cap for `Vec::with_capacity` on the declared element count. A tiny
/// frame declaring a million elements must not pre-allocate for them;
/// the vector still grows normally as elements actually parse.
const PREALLOC_CAP: usize = 1024;

/// Maximum accepted bulk string length (512 MB). Anything larger is
/// treated as a malformed frame rather than a buffering target.
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Parses one complete request frame from the front of `buf`.
///
/// Returns `Ok(Some((argv, consumed)))` when a full frame is present —
/// `argv[0]` is upper-cased, payloads are binary-safe copies — or
/// `Ok(None)` when more data is needed. Malformed input is an error;
/// the caller decides how much garbage to skip (see [`resync`]).
pub fn parse_request(buf: &[u8]) -> Result<Option<(Vec<Bytes>, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf[0] != b'*' {
        return Err(ProtocolError::ExpectedArray);
    }

    let mut pos = 1;
    let count = match read_integer_line(buf, &mut pos)? {
        Some(n) => n,
        None => return Ok(None),
    };
    if count < 0 {
        return Err(ProtocolError::InvalidLength);
    }

    let mut argv = Vec::with_capacity((count as usize).min(PREALLOC_CAP));
    for i in 0..count {
        if pos >= buf.len() {
            return Ok(None);
        }
        if buf[pos] != b'$' {
            return Err(ProtocolError::ExpectedBulk);
        }
        pos += 1;

        let len = match read_integer_line(buf, &mut pos)? {
            Some(n) => n,
            None => return Ok(None),
        };

        if len < 0 {
            // negative length decodes to an empty placeholder
            argv.push(Bytes::new());
            continue;
        }
        if len > MAX_BULK_LEN {
            return Err(ProtocolError::InvalidLength);
        }

        let len = len as usize;
        if buf.len() < pos + len + 2 {
            return Ok(None);
        }
        if buf[pos + len] != b'\r' || buf[pos + len + 1] != b'\n' {
            return Err(ProtocolError::InvalidLength);
        }

        if i == 0 {
            let mut verb = buf[pos..pos + len].to_vec();
            verb.make_ascii_uppercase();
            argv.push(Bytes::from(verb));
        } else {
            argv.push(Bytes::copy_from_slice(&buf[pos..pos + len]));
        }
        pos += len + 2;
    }

    Ok(Some((argv, pos)))
}

/// Returns how many bytes to discard so the buffer starts at the next
/// `*` frame marker (or is empty if none remains). Used to recover
/// after a malformed frame — both by the dispatcher and by journal
/// replay when it hits a corrupt region.
pub fn resync(buf: &[u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    match memchr::memchr(b'*', &buf[1..]) {
        Some(offset) => offset + 1,
        None => buf.len(),
    }
}

/// Reads a CRLF-terminated decimal integer starting at `*pos`.
///
/// Advances `pos` past the CRLF. Returns `Ok(None)` if the line is not
/// yet complete, and `InvalidLength` if the line is not a well-formed
/// signed decimal.
fn read_integer_line(buf: &[u8], pos: &mut usize) -> Result<Option<i64>, ProtocolError> {
    let line_end = match find_crlf(buf, *pos) {
        Some(end) => end,
        None => return Ok(None),
    };
    let value = parse_decimal(&buf[*pos..line_end])?;
    *pos = line_end + 2;
    Ok(Some(value))
}

/// Finds the next `\r\n` at or after `start`, returning the index of
/// the `\r`. A bare `\r` without a following `\n` is skipped over.
fn find_crlf(buf: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    while let Some(offset) = memchr::memchr(b'\r', &buf[pos..]) {
        let cr = pos + offset;
        if cr + 1 < buf.len() {
            if buf[cr + 1] == b'\n' {
                return Some(cr);
            }
            pos = cr + 1;
        } else {
            return None;
        }
    }
    None
}

/// Parses a signed decimal from raw bytes without allocating.
fn parse_decimal(digits: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidLength);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidLength);
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add((b - b'0') as i64))
            .ok_or(ProtocolError::InvalidLength)?;
    }
    Ok(if negative { -n } else { n })
}
