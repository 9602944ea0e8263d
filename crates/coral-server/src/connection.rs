//! Per-connection dispatcher.
//!
//! Each connection runs a read loop and a writer task joined by an
//! unbounded outbox channel. Replies and pub/sub pushes both go
//! through the outbox, so a subscriber sees one ordered byte stream no
//! matter which task produced the data. The read loop drains every
//! complete frame the buffer holds before writing, which is what makes
//! pipelined batches cheap.
//!
//! Side-effect ordering for writes: the store mutation commits under
//! the database lock first, then the frame is appended to the journal
//! and fanned out to replicas. A rejected write never reaches either.

use std::io;
use std::sync::Arc;

use ahash::AHashSet;
use bytes::{Bytes, BytesMut};
use coral_core::{Value, DB_COUNT};
use coral_persistence::snapshot::{self, SnapValue, SnapshotEntry};
use coral_protocol::{encode_request, parse_request, resync, Command, Reply};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::context::ServerContext;

/// Initial read buffer capacity; plenty for typical commands.
const BUF_CAPACITY: usize = 4096;

/// Read buffer cap. A client streaming an enormous incomplete frame
/// gets disconnected instead of growing the buffer without bound.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// Per-connection session state.
struct Session {
    db_index: usize,
    /// AUTH is a stub that always succeeds; nothing gates on this yet.
    #[allow(dead_code)]
    authenticated: bool,
    request_count: u64,
    subscribed: AHashSet<Bytes>,
}

impl Session {
    fn new() -> Self {
        Self {
            db_index: 0,
            authenticated: false,
            request_count: 0,
            subscribed: AHashSet::new(),
        }
    }
}

/// Drives one client connection to completion.
pub async fn handle(stream: TcpStream, ctx: Arc<ServerContext>) -> io::Result<()> {
    let conn_id = ctx.next_conn_id();
    debug!("client {conn_id} connected");

    let (read_half, write_half) = stream.into_split();
    let (outbox, outbox_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbox(write_half, outbox_rx));

    let mut session = Session::new();
    let result = read_loop(read_half, &outbox, &ctx, conn_id, &mut session).await;

    // un-register from every channel before the outbox closes
    ctx.pubsub.purge(conn_id, session.subscribed.drain());
    drop(outbox);
    let _ = writer.await;

    debug!(
        "client {conn_id} disconnected after {} requests",
        session.request_count
    );
    result
}

/// Writer task: drains outbox chunks to the socket until every sender
/// is gone (or the peer stops accepting data).
async fn write_outbox(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(chunk) = rx.recv().await {
        if write_half.write_all(&chunk).await.is_err() {
            break;
        }
    }
}

/// Read loop: accumulate bytes, drain complete frames, dispatch each.
async fn read_loop(
    mut read_half: OwnedReadHalf,
    outbox: &mpsc::UnboundedSender<Bytes>,
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    session: &mut Session,
) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);

    loop {
        if buf.len() > MAX_BUF_SIZE {
            let _ = outbox.send(Reply::Error("ERR max buffer size exceeded".into()).to_bytes());
            return Ok(());
        }

        if read_half.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }

        let mut out = BytesMut::new();
        loop {
            match parse_request(&buf) {
                Ok(Some((argv, consumed))) => {
                    let _ = buf.split_to(consumed);
                    // empty frames and empty verbs are silently ignored
                    if argv.first().map(|v| v.is_empty()).unwrap_or(true) {
                        continue;
                    }

                    ctx.count_command();
                    session.request_count += 1;

                    let (reply, quit) = dispatch(&argv, session, ctx, conn_id, outbox).await;
                    reply.write(&mut out);
                    if quit {
                        if !out.is_empty() {
                            let _ = outbox.send(out.freeze());
                        }
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    Reply::Error(e.to_string()).write(&mut out);
                    let skip = resync(&buf);
                    let _ = buf.split_to(skip);
                }
            }
        }

        if !out.is_empty() && outbox.send(out.freeze()).is_err() {
            return Ok(());
        }
    }
}

/// Resolves and executes one command. Returns the reply and whether
/// the connection should close afterwards.
async fn dispatch(
    argv: &[Bytes],
    session: &mut Session,
    ctx: &Arc<ServerContext>,
    conn_id: u64,
    outbox: &mpsc::UnboundedSender<Bytes>,
) -> (Reply, bool) {
    let command = match Command::resolve(argv) {
        Ok(command) => command,
        Err(e) => return (Reply::Error(e.to_string()), false),
    };

    let reply = match command {
        Command::Ping => Reply::Simple("PONG".into()),

        Command::Echo { message } => Reply::Bulk(message),

        Command::Set { key, value } => {
            ctx.store.db(session.db_index).set(key, value);
            propagate(ctx, argv).await;
            Reply::ok()
        }

        Command::Get { key } => match ctx.store.db(session.db_index).get(&key) {
            Ok(Some(value)) => Reply::Bulk(value),
            Ok(None) => Reply::Nil,
            Err(e) => Reply::Error(e.to_string()),
        },

        Command::Del { key } => {
            let removed = ctx.store.db(session.db_index).del(&key);
            if removed {
                propagate(ctx, argv).await;
            }
            Reply::Integer(i64::from(removed))
        }

        Command::Exists { key } => {
            let exists = ctx.store.db(session.db_index).exists(&key);
            Reply::Integer(i64::from(exists))
        }

        Command::Keys => {
            let keys = ctx.store.db(session.db_index).keys();
            Reply::Array(keys.into_iter().map(Reply::Bulk).collect())
        }

        Command::Expire { key, seconds } => {
            let applied = ctx.store.db(session.db_index).expire(&key, seconds);
            if applied {
                propagate(ctx, argv).await;
            }
            Reply::Integer(i64::from(applied))
        }

        Command::Ttl { key } => {
            Reply::Integer(ctx.store.db(session.db_index).ttl(&key).as_reply())
        }

        Command::MGet { keys } => {
            let mut db = ctx.store.db(session.db_index);
            Reply::Array(
                keys.iter()
                    .map(|key| match db.get_or_nil(key) {
                        Some(value) => Reply::Bulk(value),
                        None => Reply::Nil,
                    })
                    .collect(),
            )
        }

        Command::IncrBy { key, delta } => {
            match ctx.store.db(session.db_index).incr_by(&key, delta) {
                Ok(value) => Reply::Integer(value),
                Err(e) => Reply::Error(e.to_string()),
            }
        }

        Command::Append { key, value } => {
            match ctx.store.db(session.db_index).append(&key, &value) {
                Ok(len) => Reply::Integer(len as i64),
                Err(e) => Reply::Error(e.to_string()),
            }
        }

        Command::StrLen { key } => match ctx.store.db(session.db_index).strlen(&key) {
            Ok(len) => Reply::Integer(len as i64),
            Err(e) => Reply::Error(e.to_string()),
        },

        Command::HSet { key, field, value } => {
            // bind the result first so the database guard is released
            // before the journal/replica awaits
            let result = ctx.store.db(session.db_index).hset(&key, field, value);
            match result {
                Ok(created) => {
                    propagate(ctx, argv).await;
                    Reply::Integer(i64::from(created))
                }
                Err(e) => Reply::Error(e.to_string()),
            }
        }

        Command::HGet { key, field } => {
            match ctx.store.db(session.db_index).hget(&key, &field) {
                Ok(Some(value)) => Reply::Bulk(value),
                Ok(None) => Reply::Nil,
                Err(e) => Reply::Error(e.to_string()),
            }
        }

        Command::Select { index } => {
            if (0..DB_COUNT as i64).contains(&index) {
                session.db_index = index as usize;
                Reply::ok()
            } else {
                Reply::Error("Database index out of range".into())
            }
        }

        Command::Info => {
            let info = format!(
                "uptime:{}\ntotal_keys:{}\ncommands_processed:{}\ndatabases:{}\n",
                ctx.uptime_secs(),
                ctx.store.total_keys(),
                ctx.commands_processed(),
                DB_COUNT,
            );
            Reply::Bulk(Bytes::from(info))
        }

        Command::Save => {
            let entries = to_snapshot_entries(ctx.store.db(session.db_index).snapshot());
            match snapshot::save(&ctx.rdb_path, &entries) {
                Ok(()) => Reply::ok(),
                Err(e) => {
                    error!("snapshot save failed: {e}");
                    Reply::Error("ERR Save failed".into())
                }
            }
        }

        Command::Load => match snapshot::load(&ctx.rdb_path) {
            Ok(entries) => {
                ctx.store
                    .db(session.db_index)
                    .restore(from_snapshot_entries(entries));
                Reply::ok()
            }
            Err(e) => {
                error!("snapshot load failed: {e}");
                Reply::Error("ERR Load failed".into())
            }
        },

        Command::Auth => {
            session.authenticated = true;
            Reply::ok()
        }

        Command::Subscribe { channels } => {
            for channel in channels {
                ctx.pubsub
                    .subscribe(channel.clone(), conn_id, outbox.clone());
                session.subscribed.insert(channel);
            }
            Reply::ok()
        }

        Command::Publish { channel, message } => {
            let payload =
                Reply::Array(vec![Reply::Bulk(channel.clone()), Reply::Bulk(message)]).to_bytes();
            let recipients = ctx.pubsub.publish(&channel, &payload);
            Reply::Integer(recipients as i64)
        }

        Command::Eval => Reply::Error("ERR Scripting not implemented".into()),

        Command::Quit => return (Reply::ok(), true),

        Command::Unknown(verb) => Reply::Error(format!("ERR unknown command '{verb}'")),
    };

    (reply, false)
}

/// Appends the committed write to the journal and fans it out to
/// replicas, in its request wire form.
async fn propagate(ctx: &ServerContext, argv: &[Bytes]) {
    let mut buf = BytesMut::new();
    encode_request(argv, &mut buf);
    let frame = buf.freeze();

    if let Some(journal) = &ctx.journal {
        journal.append(frame.clone());
    }
    ctx.replicas.replicate(&frame).await;
}

fn to_snapshot_entries(dump: Vec<(Bytes, Value, i64)>) -> Vec<SnapshotEntry> {
    dump.into_iter()
        .map(|(key, value, expires_at)| SnapshotEntry {
            key,
            value: match value {
                Value::Str(data) => SnapValue::Str(data),
                Value::Hash(fields) => SnapValue::Hash(fields.into_iter().collect()),
            },
            expires_at,
        })
        .collect()
}

fn from_snapshot_entries(entries: Vec<SnapshotEntry>) -> Vec<(Bytes, Value, i64)> {
    entries
        .into_iter()
        .map(|entry| {
            let value = match entry.value {
                SnapValue::Str(data) => Value::Str(data),
                SnapValue::Hash(fields) => Value::Hash(fields.into_iter().collect()),
            };
            (entry.key, value, entry.expires_at)
        })
        .collect()
}
