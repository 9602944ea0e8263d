//! Binary snapshot of one database.
//!
//! File layout (all integers little-endian):
//!
//! ```text
//! [num_entries: u32]
//! per entry:
//!   [type: u8]                    0 = string, 1 = hash
//!   [key_len: u32][key bytes]
//!   type 0: [val_len: u32][val bytes]
//!   type 1: [num_fields: u32] per field: [f_len: u32][f][v_len: u32][v]
//!   [expiry: i64]                 absolute seconds; 0 = no TTL
//! ```
//!
//! The writer dumps whatever it is given; deciding which entries are
//! still live (and dropping expired ones on load) is the store's job.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bytes::Bytes;

use crate::format::{self, FormatError};

const TYPE_STRING: u8 = 0;
const TYPE_HASH: u8 = 1;

/// A snapshot-level value, decoupled from the store's in-memory types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapValue {
    Str(Bytes),
    Hash(Vec<(Bytes, Bytes)>),
}

/// One dumped key with its value and absolute expiry (0 = none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub key: Bytes,
    pub value: SnapValue,
    pub expires_at: i64,
}

/// Writes a snapshot file, replacing anything at `path`.
pub fn save(path: &Path, entries: &[SnapshotEntry]) -> Result<(), FormatError> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    let count = u32::try_from(entries.len()).map_err(|_| {
        FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "too many entries for snapshot",
        ))
    })?;
    format::write_u32(&mut w, count)?;

    for entry in entries {
        match &entry.value {
            SnapValue::Str(data) => {
                format::write_u8(&mut w, TYPE_STRING)?;
                format::write_bytes(&mut w, &entry.key)?;
                format::write_bytes(&mut w, data)?;
            }
            SnapValue::Hash(fields) => {
                format::write_u8(&mut w, TYPE_HASH)?;
                format::write_bytes(&mut w, &entry.key)?;
                format::write_u32(&mut w, fields.len() as u32)?;
                for (field, value) in fields {
                    format::write_bytes(&mut w, field)?;
                    format::write_bytes(&mut w, value)?;
                }
            }
        }
        format::write_i64(&mut w, entry.expires_at)?;
    }

    w.flush()?;
    Ok(())
}

/// Reads a snapshot file back into entries.
pub fn load(path: &Path) -> Result<Vec<SnapshotEntry>, FormatError> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let count = format::read_u32(&mut r)?;
    let mut entries = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        entries.push(read_entry(&mut r)?);
    }
    Ok(entries)
}

fn read_entry(r: &mut impl Read) -> Result<SnapshotEntry, FormatError> {
    let type_tag = format::read_u8(r)?;
    let key = Bytes::from(format::read_bytes(r)?);

    let value = match type_tag {
        TYPE_STRING => SnapValue::Str(Bytes::from(format::read_bytes(r)?)),
        TYPE_HASH => {
            let num_fields = format::read_u32(r)?;
            let mut fields = Vec::with_capacity(num_fields.min(1024) as usize);
            for _ in 0..num_fields {
                let field = Bytes::from(format::read_bytes(r)?);
                let val = Bytes::from(format::read_bytes(r)?);
                fields.push((field, val));
            }
            SnapValue::Hash(fields)
        }
        other => return Err(FormatError::UnknownType(other)),
    };

    let expires_at = format::read_i64(r)?;
    Ok(SnapshotEntry {
        key,
        value,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    fn temp_path(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(name);
        (dir, path)
    }

    #[test]
    fn round_trip_strings_and_hashes() {
        let (_dir, path) = temp_path("dump.rdb");

        let entries = vec![
            SnapshotEntry {
                key: bytes("plain"),
                value: SnapValue::Str(bytes("value")),
                expires_at: 0,
            },
            SnapshotEntry {
                key: bytes("timed"),
                value: SnapValue::Str(bytes("soon")),
                expires_at: 1_900_000_000,
            },
            SnapshotEntry {
                key: bytes("hash"),
                value: SnapValue::Hash(vec![
                    (bytes("f1"), bytes("v1")),
                    (bytes("f2"), bytes("v2")),
                ]),
                expires_at: 0,
            },
        ];

        save(&path, &entries).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn round_trip_binary_payloads() {
        let (_dir, path) = temp_path("binary.rdb");

        let entries = vec![SnapshotEntry {
            key: Bytes::from_static(b"k\x00ey"),
            value: SnapValue::Str(Bytes::from_static(b"va\x00\xff\r\nue")),
            expires_at: 0,
        }];

        save(&path, &entries).unwrap();
        assert_eq!(load(&path).unwrap(), entries);
    }

    #[test]
    fn empty_snapshot() {
        let (_dir, path) = temp_path("empty.rdb");
        save(&path, &[]).unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn empty_hash_and_empty_values() {
        let (_dir, path) = temp_path("edge.rdb");
        let entries = vec![
            SnapshotEntry {
                key: bytes("empty-str"),
                value: SnapValue::Str(Bytes::new()),
                expires_at: 0,
            },
            SnapshotEntry {
                key: bytes("empty-hash"),
                value: SnapValue::Hash(vec![]),
                expires_at: 0,
            },
        ];
        save(&path, &entries).unwrap();
        assert_eq!(load(&path).unwrap(), entries);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let (_dir, path) = temp_path("trunc.rdb");

        save(
            &path,
            &[SnapshotEntry {
                key: bytes("k"),
                value: SnapValue::Str(bytes("v")),
                expires_at: 0,
            }],
        )
        .unwrap();

        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 4]).unwrap();

        assert!(matches!(
            load(&path).unwrap_err(),
            FormatError::UnexpectedEof
        ));
    }

    #[test]
    fn unknown_type_tag_is_an_error() {
        let (_dir, path) = temp_path("badtag.rdb");

        // one entry with an invented type tag
        let mut raw = Vec::new();
        format::write_u32(&mut raw, 1).unwrap();
        format::write_u8(&mut raw, 9).unwrap();
        format::write_bytes(&mut raw, b"key").unwrap();
        std::fs::write(&path, &raw).unwrap();

        assert!(matches!(
            load(&path).unwrap_err(),
            FormatError::UnknownType(9)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let (_dir, path) = temp_path("nope.rdb");
        assert!(matches!(load(&path).unwrap_err(), FormatError::Io(_)));
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let (_dir, path) = temp_path("overwrite.rdb");

        save(
            &path,
            &[SnapshotEntry {
                key: bytes("old"),
                value: SnapValue::Str(bytes("1")),
                expires_at: 0,
            }],
        )
        .unwrap();
        save(
            &path,
            &[SnapshotEntry {
                key: bytes("new"),
                value: SnapValue::Str(bytes("2")),
                expires_at: 0,
            }],
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, bytes("new"));
    }
}
