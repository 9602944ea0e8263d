//! TCP listener: accepts connections and feeds them to the dispatcher.
//!
//! Two drivers share the same connection handler, selected by
//! configuration. The default spawns one task per connection. The
//! worker-pool driver runs a fixed number of workers (one per
//! available core) that pull accepted sockets from a shared queue —
//! many idle connections multiplex over few workers, at the cost of a
//! slow connection occupying its worker.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::connection;
use crate::context::ServerContext;

/// Backlog for the listening socket.
const BACKLOG: u32 = 1024;

/// Queue depth between the accept loop and pool workers.
const POOL_QUEUE_DEPTH: usize = 256;

/// Binds the listening socket with address reuse enabled.
pub fn bind(port: u16) -> io::Result<TcpListener> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
    socket.listen(BACKLOG)
}

/// Runs the accept loop until it fails. `use_pool` selects the
/// worker-pool driver; otherwise each connection gets its own task.
pub async fn run(listener: TcpListener, ctx: Arc<ServerContext>, use_pool: bool) -> io::Result<()> {
    if use_pool {
        run_pooled(listener, ctx).await
    } else {
        run_spawning(listener, ctx).await
    }
}

/// One task per connection.
async fn run_spawning(listener: TcpListener, ctx: Arc<ServerContext>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = connection::handle(stream, ctx).await {
                debug!("connection from {peer} ended with error: {e}");
            }
        });
    }
}

/// Fixed worker pool fed from the accept loop through a queue.
async fn run_pooled(listener: TcpListener, ctx: Arc<ServerContext>) -> io::Result<()> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let (tx, rx) = mpsc::channel::<(TcpStream, SocketAddr)>(POOL_QUEUE_DEPTH);
    let rx = Arc::new(Mutex::new(rx));

    info!("serving connections from a pool of {workers} workers");
    for _ in 0..workers {
        let rx = Arc::clone(&rx);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                let Some((stream, peer)) = next else {
                    break;
                };
                if let Err(e) = connection::handle(stream, Arc::clone(&ctx)).await {
                    debug!("connection from {peer} ended with error: {e}");
                }
            }
        });
    }

    loop {
        let accepted = listener.accept().await?;
        if tx.send(accepted).await.is_err() {
            return Ok(());
        }
    }
}
