//! Chat relay: fans every inbound message out to all connected clients.
//!
//! Each connection gets one reader task that decodes frames and pushes them
//! onto a shared bounded channel. A single hub task drains that channel and
//! writes each message to a snapshot of the connection registry. Any read or
//! write failure evicts just the connection it happened on. Evicting a
//! connection also stops its reader, so it can no longer publish.
//!
//! The inbound channel is bounded (`RelayConfig::inbound_capacity`). When the
//! hub falls behind, readers block on send; messages are never dropped.

mod error;
pub mod hub;
pub mod reader;
pub mod registry;
pub mod stats;
pub mod writer;

#[cfg(test)]
pub(crate) mod testutil;

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use huddle_core::{ChatMessage, ConnId};

pub use error::RelayError;
pub use hub::{BroadcastHub, FanOut};
pub use reader::{run_reader, ReaderExit};
pub use registry::ConnectionRegistry;
pub use stats::{RelayStats, StatsSnapshot};
pub use writer::SinkConnection;

/// Write side of one chat participant, as seen by the registry and the hub.
#[async_trait]
pub trait ChatConnection: Send + Sync {
    fn id(&self) -> &ConnId;

    /// Write one message. Never retries.
    async fn send(&self, message: &ChatMessage) -> Result<(), RelayError>;

    /// Release the underlying transport. Safe to call more than once.
    async fn close(&self);
}

/// A decoded message plus the connection it arrived on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub from: ConnId,
    pub message: ChatMessage,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Capacity of the reader-to-hub channel.
    pub inbound_capacity: usize,
    /// Deliver a message back to the connection that sent it.
    pub echo_to_sender: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 256,
            echo_to_sender: true,
        }
    }
}

/// Handle to a running relay. Cheap to clone.
#[derive(Clone)]
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<RelayStats>,
    inbound: mpsc::Sender<Envelope>,
    shutdown: CancellationToken,
}

impl Relay {
    /// Spawn the broadcast hub. The hub stops when `shutdown` is cancelled.
    pub fn start(config: &RelayConfig, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(RelayStats::default());
        let (hub, inbound) = BroadcastHub::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config,
            shutdown.clone(),
        );
        let handle = tokio::spawn(hub.run());

        let relay = Self {
            registry,
            stats,
            inbound,
            shutdown,
        };
        (relay, handle)
    }

    /// Take ownership of an upgraded WebSocket.
    pub fn accept(&self, socket: WebSocket) -> ConnId {
        let (sink, stream) = socket.split();
        self.attach(sink, stream)
    }

    /// Register a connection made of a frame sink and a frame stream, then
    /// spawn its reader.
    pub fn attach<W, R, E>(&self, sink: W, frames: R) -> ConnId
    where
        W: Sink<WsMessage> + Unpin + Send + 'static,
        W::Error: Display + Send,
        R: Stream<Item = Result<WsMessage, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = ConnId::new();
        let conn = Arc::new(SinkConnection::new(id.clone(), sink));
        let closed = conn.close_signal();
        self.registry.add(conn);
        self.stats.record_accepted();
        info!(conn_id = %id, connections = self.registry.len(), "chat client connected");

        let reader = run_reader(
            id.clone(),
            frames,
            self.inbound.clone(),
            Arc::clone(&self.registry),
            closed,
            self.shutdown.clone(),
        );
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            reader.await;
            stats.record_disconnect();
        });
        id
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the hub and every reader, then close all connections.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let closed = self.registry.close_all().await;
        info!(closed, "chat relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use std::time::Duration;

    type Frame = Result<WsMessage, std::io::Error>;

    /// Client side of an in-memory connection.
    struct Peer {
        id: ConnId,
        outbound: fmpsc::UnboundedReceiver<WsMessage>,
        inbound: fmpsc::UnboundedSender<Frame>,
    }

    impl Peer {
        fn connect(relay: &Relay) -> Self {
            let (sink, outbound) = fmpsc::unbounded();
            let (inbound, frames) = fmpsc::unbounded();
            let id = relay.attach(sink, frames);
            Self {
                id,
                outbound,
                inbound,
            }
        }

        fn say(&self, username: &str, content: &str) {
            let json = ChatMessage::new(username, content).to_json().unwrap();
            self.inbound
                .unbounded_send(Ok(WsMessage::Text(json.into())))
                .unwrap();
        }

        async fn next_message(&mut self) -> ChatMessage {
            let frame = tokio::time::timeout(Duration::from_secs(1), self.outbound.next())
                .await
                .expect("timed out waiting for message")
                .expect("connection closed");
            match frame {
                WsMessage::Text(text) => ChatMessage::from_json(text.as_str()).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            }
        }

        async fn assert_silent(&mut self) {
            let next = tokio::time::timeout(Duration::from_millis(50), self.outbound.next()).await;
            assert!(next.is_err(), "expected no message, got {next:?}");
        }
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn start(echo_to_sender: bool) -> Relay {
        let config = RelayConfig {
            echo_to_sender,
            ..Default::default()
        };
        Relay::start(&config, CancellationToken::new()).0
    }

    #[tokio::test]
    async fn three_peers_then_one_breaks() {
        let relay = start(true);
        let mut a = Peer::connect(&relay);
        let mut b = Peer::connect(&relay);
        let mut c = Peer::connect(&relay);
        assert_eq!(relay.connection_count(), 3);

        a.say("alice", "hi");
        let expected = ChatMessage::new("alice", "hi");
        assert_eq!(b.next_message().await, expected);
        assert_eq!(c.next_message().await, expected);
        // The sender is part of the fan-out.
        assert_eq!(a.next_message().await, expected);
        b.assert_silent().await;

        // Break B's write path: the next write to it fails and evicts it.
        drop(b.outbound);
        a.say("alice", "second");
        assert_eq!(c.next_message().await.content, "second");
        assert_eq!(a.next_message().await.content, "second");

        wait_for(|| relay.connection_count() == 2).await;
        let mut ids = relay.registry().ids();
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        let mut expected_ids = vec![a.id.clone(), c.id.clone()];
        expected_ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, expected_ids);
        assert!(!relay.registry().contains(&b.id));
    }

    #[tokio::test]
    async fn evicted_peer_can_no_longer_publish() {
        let relay = start(true);
        let mut a = Peer::connect(&relay);
        let b = Peer::connect(&relay);
        let mut c = Peer::connect(&relay);

        drop(b.outbound);
        a.say("alice", "evict b");
        assert_eq!(c.next_message().await.content, "evict b");
        assert_eq!(a.next_message().await.content, "evict b");
        wait_for(|| !relay.registry().contains(&b.id)).await;

        // The reader is gone along with the write side.
        wait_for(|| b.inbound.is_closed()).await;
        let late = ChatMessage::new("bob", "from beyond").to_json().unwrap();
        assert!(b
            .inbound
            .unbounded_send(Ok(WsMessage::Text(late.into())))
            .is_err());
        c.assert_silent().await;
        a.assert_silent().await;
        wait_for(|| relay.stats().disconnects == 1).await;
    }

    #[tokio::test]
    async fn sender_not_echoed_when_disabled() {
        let relay = start(false);
        let mut a = Peer::connect(&relay);
        let mut b = Peer::connect(&relay);

        a.say("alice", "hi");
        assert_eq!(b.next_message().await.content, "hi");
        a.assert_silent().await;
    }

    #[tokio::test]
    async fn reader_side_close_deregisters() {
        let relay = start(true);
        let a = Peer::connect(&relay);
        let mut b = Peer::connect(&relay);

        a.inbound.unbounded_send(Ok(WsMessage::Close(None))).unwrap();
        wait_for(|| relay.connection_count() == 1).await;

        b.say("bob", "anyone?");
        assert_eq!(b.next_message().await.content, "anyone?");
        assert_eq!(relay.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn malformed_frame_evicts_only_that_peer() {
        let relay = start(true);
        let a = Peer::connect(&relay);
        let mut b = Peer::connect(&relay);

        a.inbound
            .unbounded_send(Ok(WsMessage::Text("garbage".to_owned().into())))
            .unwrap();
        wait_for(|| relay.connection_count() == 1).await;
        assert!(relay.registry().contains(&b.id));

        b.say("bob", "still here");
        assert_eq!(b.next_message().await.content, "still here");
    }

    #[tokio::test]
    async fn each_peer_sees_messages_in_arrival_order() {
        let relay = start(true);
        let a = Peer::connect(&relay);
        let mut b = Peer::connect(&relay);

        for i in 0..50 {
            a.say("alice", &i.to_string());
        }
        for i in 0..50 {
            assert_eq!(b.next_message().await.content, i.to_string());
        }
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let relay = start(true);
        let mut a = Peer::connect(&relay);
        let _b = Peer::connect(&relay);

        relay.shutdown().await;
        assert_eq!(relay.connection_count(), 0);

        let end = tokio::time::timeout(Duration::from_secs(1), a.outbound.next())
            .await
            .unwrap();
        assert!(end.is_none());
    }
}
