//! Primary → replica fan-out.
//!
//! Keeps an ordered list of downstream servers and re-sends every
//! journaled write command, in its request wire form, to each one that
//! is still connected. Delivery is best-effort: a short or failed
//! write marks that replica disconnected and closes its socket, and
//! nothing is reported back to the client whose write triggered the
//! send. There is no reconnect loop — a dropped replica stays dropped
//! until it is added again.

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug)]
struct Replica {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

/// The replica registry.
#[derive(Debug, Default)]
pub struct Replicator {
    replicas: Mutex<Vec<Replica>>,
}

impl Replicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dials a replica and adds it to the fan-out list. A host:port
    /// pair that is already registered is left alone.
    pub async fn add_replica(&self, host: &str, port: u16) -> io::Result<()> {
        let mut replicas = self.replicas.lock().await;
        if replicas.iter().any(|r| r.host == host && r.port == port) {
            warn!("replica {host}:{port} already exists");
            return Ok(());
        }

        let stream = TcpStream::connect((host, port)).await?;
        replicas.push(Replica {
            host: host.to_string(),
            port,
            stream: Some(stream),
        });
        info!("connected to replica {host}:{port}");
        Ok(())
    }

    /// Drops a replica, closing its connection. Returns `true` if it
    /// was registered.
    pub async fn remove_replica(&self, host: &str, port: u16) -> bool {
        let mut replicas = self.replicas.lock().await;
        let before = replicas.len();
        replicas.retain(|r| !(r.host == host && r.port == port));
        let removed = replicas.len() < before;
        if removed {
            info!("removed replica {host}:{port}");
        }
        removed
    }

    /// Sends an encoded write frame to every connected replica. Holds
    /// the list lock across all sends so frames reach each replica in
    /// the same order the store applied them.
    pub async fn replicate(&self, frame: &[u8]) {
        let mut replicas = self.replicas.lock().await;
        for replica in replicas.iter_mut() {
            let Some(stream) = replica.stream.as_mut() else {
                continue;
            };
            if let Err(e) = stream.write_all(frame).await {
                warn!(
                    "failed to send to replica {}:{}: {e}",
                    replica.host, replica.port
                );
                replica.stream = None;
            }
        }
    }

    /// Number of replicas with a live connection.
    pub async fn connected_count(&self) -> usize {
        self.replicas
            .lock()
            .await
            .iter()
            .filter(|r| r.stream.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn add_and_replicate() {
        let (listener, port) = listen().await;
        let replicator = Replicator::new();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        replicator.add_replica("127.0.0.1", port).await.unwrap();
        let mut downstream = accept.await.unwrap();

        let frame = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n";
        replicator.replicate(frame).await;

        let mut got = vec![0u8; frame.len()];
        downstream.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, frame);
        assert_eq!(replicator.connected_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_replica_is_ignored() {
        let (listener, port) = listen().await;
        let replicator = Replicator::new();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            stream
        });
        replicator.add_replica("127.0.0.1", port).await.unwrap();
        let _downstream = accept.await.unwrap();

        replicator.add_replica("127.0.0.1", port).await.unwrap();
        assert_eq!(replicator.connected_count().await, 1);
    }

    #[tokio::test]
    async fn unreachable_replica_is_an_error() {
        let replicator = Replicator::new();
        // a port from the ephemeral range with nothing listening
        let result = replicator.add_replica("127.0.0.1", 1).await;
        assert!(result.is_err());
        assert_eq!(replicator.connected_count().await, 0);
    }

    #[tokio::test]
    async fn failed_send_disconnects_replica() {
        let (listener, port) = listen().await;
        let replicator = Replicator::new();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        replicator.add_replica("127.0.0.1", port).await.unwrap();
        let downstream = accept.await.unwrap();
        drop(downstream);

        // the peer is gone; a couple of sends flush out the failure
        replicator.replicate(b"*1\r\n$4\r\nPING\r\n").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        replicator.replicate(b"*1\r\n$4\r\nPING\r\n").await;
        replicator.replicate(b"*1\r\n$4\r\nPING\r\n").await;

        assert_eq!(replicator.connected_count().await, 0);
    }

    #[tokio::test]
    async fn remove_replica_drops_connection() {
        let (listener, port) = listen().await;
        let replicator = Replicator::new();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        replicator.add_replica("127.0.0.1", port).await.unwrap();
        let _downstream = accept.await.unwrap();

        assert!(replicator.remove_replica("127.0.0.1", port).await);
        assert!(!replicator.remove_replica("127.0.0.1", port).await);
        assert_eq!(replicator.connected_count().await, 0);
    }
}
