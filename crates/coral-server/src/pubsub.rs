//! Pub/sub channel registry.
//!
//! Maps channel names to the outboxes of subscribed connections. The
//! registry stores connection handles, not sockets — a handle is the
//! connection's outbox sender plus its numeric id for set membership.
//! PUBLISH holds the registry lock across the whole fan-out so the
//! subscriber set can't be reshaped mid-iteration by a concurrent
//! SUBSCRIBE or disconnect.

use ahash::AHashMap;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

type Subscribers = AHashMap<u64, mpsc::UnboundedSender<Bytes>>;

/// Process-wide channel → subscriber-set registry.
#[derive(Debug, Default)]
pub struct PubSub {
    channels: Mutex<AHashMap<Bytes, Subscribers>>,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outbox under a channel. Subscribing
    /// twice to the same channel just replaces the stored handle.
    pub fn subscribe(&self, channel: Bytes, conn_id: u64, outbox: mpsc::UnboundedSender<Bytes>) {
        self.channels
            .lock()
            .entry(channel)
            .or_default()
            .insert(conn_id, outbox);
    }

    /// Enqueues `payload` to every subscriber of `channel`, returning
    /// how many subscribers it was sent to. A subscriber whose outbox
    /// is already gone still counts — it will be purged when its
    /// connection finishes tearing down.
    pub fn publish(&self, channel: &Bytes, payload: &Bytes) -> usize {
        let channels = self.channels.lock();
        let Some(subscribers) = channels.get(channel) else {
            return 0;
        };
        for outbox in subscribers.values() {
            let _ = outbox.send(payload.clone());
        }
        subscribers.len()
    }

    /// Removes a connection from every channel it subscribed to.
    /// Channels left without subscribers are dropped from the registry.
    pub fn purge(&self, conn_id: u64, subscribed: impl IntoIterator<Item = Bytes>) {
        let mut channels = self.channels.lock();
        for channel in subscribed {
            if let Some(subscribers) = channels.get_mut(&channel) {
                subscribers.remove(&conn_id);
                if subscribers.is_empty() {
                    channels.remove(&channel);
                }
            }
        }
    }

    /// Number of subscribers currently registered under a channel.
    pub fn subscriber_count(&self, channel: &Bytes) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}
