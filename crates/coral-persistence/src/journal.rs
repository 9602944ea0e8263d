//! Append-only journal of write commands.
//!
//! The file is a concatenation of request frames, byte-identical to
//! what a client would send — a valid protocol stream in its own
//! right. Handlers enqueue encoded frames onto a bounded channel; a
//! single drain task owns the file and flushes after every frame, so
//! producers never block on disk I/O. Replay parses the file with the
//! regular request parser and resynchronizes past corrupt regions.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use coral_protocol::{parse_request, resync};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Queue depth between handlers and the drain task. Deep enough to
/// absorb write bursts; when it fills, frames are dropped with a
/// warning rather than stalling command processing.
const QUEUE_DEPTH: usize = 1024;

/// The open journal: owns the drain task. Keep this on the server's
/// main path and call [`Journal::stop`] at shutdown; handlers get a
/// cheap [`JournalHandle`] clone instead.
#[derive(Debug)]
pub struct Journal {
    tx: mpsc::Sender<Bytes>,
    worker: JoinHandle<()>,
    path: PathBuf,
}

/// Cloneable producer side of the journal queue.
#[derive(Debug, Clone)]
pub struct JournalHandle {
    tx: mpsc::Sender<Bytes>,
}

impl Journal {
    /// Opens (or creates) the journal file in append mode and spawns
    /// the drain task.
    pub async fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::spawn(drain(file, rx));

        Ok(Self { tx, worker, path })
    }

    /// A producer handle for the dispatcher.
    pub fn handle(&self) -> JournalHandle {
        JournalHandle {
            tx: self.tx.clone(),
        }
    }

    /// The journal file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shuts the journal down: closes the queue, then waits for the
    /// drain task to write out everything still buffered.
    pub async fn stop(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!("journal drain task failed: {e}");
        }
    }
}

impl JournalHandle {
    /// Enqueues an encoded request frame for appending. Never blocks;
    /// a full or closed queue drops the frame.
    pub fn append(&self, frame: Bytes) {
        if let Err(e) = self.tx.try_send(frame) {
            warn!("journal append dropped: {e}");
        }
    }
}

/// Drain loop: writes and flushes each frame in arrival order. Runs
/// until every producer handle is gone and the queue is empty.
async fn drain(mut file: tokio::fs::File, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = file.write_all(&frame).await {
            error!("journal write failed: {e}");
            continue;
        }
        if let Err(e) = file.flush().await {
            warn!("journal flush failed: {e}");
        }
    }
    debug!("journal drain task exiting");
}

/// Reads every well-formed request frame out of a journal file.
///
/// Skips corrupt regions by scanning ahead to the next `*` marker and
/// stops at a partial trailing frame (a crash mid-append leaves one).
/// A missing file is an empty journal, not an error.
pub fn read_frames(path: &Path) -> io::Result<Vec<Vec<Bytes>>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match parse_request(&data[pos..]) {
            Ok(Some((argv, consumed))) => {
                pos += consumed;
                if !argv.is_empty() {
                    frames.push(argv);
                }
            }
            Ok(None) => break,
            Err(_) => {
                let skip = resync(&data[pos..]);
                if skip == 0 {
                    break;
                }
                pos += skip;
            }
        }
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use coral_protocol::encode_request;

    fn frame(parts: &[&[u8]]) -> Bytes {
        let argv: Vec<Bytes> = parts.iter().map(|p| Bytes::copy_from_slice(p)).collect();
        let mut buf = BytesMut::new();
        encode_request(&argv, &mut buf);
        buf.freeze()
    }

    fn argv(parts: &[&[u8]]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::copy_from_slice(p)).collect()
    }

    #[tokio::test]
    async fn append_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let journal = Journal::open(&path).await.unwrap();
        let handle = journal.handle();
        handle.append(frame(&[b"SET", b"a", b"1"]));
        handle.append(frame(&[b"SET", b"b", b"2"]));
        handle.append(frame(&[b"DEL", b"a"]));
        journal.stop().await;

        let frames = read_frames(&path).unwrap();
        assert_eq!(
            frames,
            vec![
                argv(&[b"SET", b"a", b"1"]),
                argv(&[b"SET", b"b", b"2"]),
                argv(&[b"DEL", b"a"]),
            ]
        );
    }

    #[tokio::test]
    async fn reopen_appends_after_existing_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let journal = Journal::open(&path).await.unwrap();
        journal.handle().append(frame(&[b"SET", b"a", b"1"]));
        journal.stop().await;

        let journal = Journal::open(&path).await.unwrap();
        journal.handle().append(frame(&[b"SET", b"b", b"2"]));
        journal.stop().await;

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], argv(&[b"SET", b"b", b"2"]));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_frames(&dir.path().join("absent.aof"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn file_is_a_valid_protocol_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.aof");

        let mut raw = Vec::new();
        raw.extend_from_slice(&frame(&[b"SET", b"key", b"value"]));
        raw.extend_from_slice(&frame(&[b"EXPIRE", b"key", b"60"]));
        std::fs::write(&path, &raw).unwrap();

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][0], Bytes::from_static(b"SET"));
        assert_eq!(frames[1][0], Bytes::from_static(b"EXPIRE"));
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.aof");

        let mut raw = Vec::new();
        raw.extend_from_slice(&frame(&[b"SET", b"a", b"1"]));
        // a crash mid-append: half of a second frame
        raw.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$1\r\nb");
        std::fs::write(&path, &raw).unwrap();

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames, vec![argv(&[b"SET", b"a", b"1"])]);
    }

    #[test]
    fn corrupt_region_resyncs_to_next_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.aof");

        let mut raw = Vec::new();
        raw.extend_from_slice(b"garbage bytes here");
        raw.extend_from_slice(&frame(&[b"SET", b"a", b"1"]));
        raw.extend_from_slice(b"-more junk\r\n");
        raw.extend_from_slice(&frame(&[b"SET", b"b", b"2"]));
        std::fs::write(&path, &raw).unwrap();

        let frames = read_frames(&path).unwrap();
        assert_eq!(
            frames,
            vec![argv(&[b"SET", b"a", b"1"]), argv(&[b"SET", b"b", b"2"])]
        );
    }

    #[test]
    fn binary_values_survive_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.aof");

        std::fs::write(&path, frame(&[b"SET", b"k", b"va\x00\xffue"])).unwrap();

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames[0][2], Bytes::from_static(b"va\x00\xffue"));
    }
}
