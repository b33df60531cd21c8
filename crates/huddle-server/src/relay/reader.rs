use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::{ChatMessage, ConnId};

use super::registry::ConnectionRegistry;
use super::{Envelope, RelayError};

/// Why a reader stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderExit {
    /// Close frame or end of stream.
    PeerClosed,
    /// Transport or decode failure.
    Failed(RelayError),
    /// The hub dropped its receiver.
    HubStopped,
    /// The connection was closed from the write side (evicted by the hub).
    Evicted,
    Shutdown,
}

/// Read frames from one connection and forward decoded messages to the hub.
///
/// Runs until the peer goes away, a frame fails to decode, the transport
/// errors, the connection is closed (`closed` is cancelled), or shutdown is
/// requested. Whatever the reason, the connection is removed from the
/// registry before returning. A malformed frame ends the connection rather
/// than being skipped.
pub async fn run_reader<S, E>(
    conn_id: ConnId,
    mut frames: S,
    inbound: mpsc::Sender<Envelope>,
    registry: Arc<ConnectionRegistry>,
    closed: CancellationToken,
    shutdown: CancellationToken,
) -> ReaderExit
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let exit = loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break ReaderExit::Shutdown,
            _ = closed.cancelled() => break ReaderExit::Evicted,
            frame = frames.next() => frame,
        };

        let decoded = match frame {
            None | Some(Ok(WsMessage::Close(_))) => break ReaderExit::PeerClosed,
            Some(Err(e)) => break ReaderExit::Failed(RelayError::Transport(e.to_string())),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(WsMessage::Text(text))) => ChatMessage::from_json(text.as_str()),
            Some(Ok(WsMessage::Binary(bytes))) => ChatMessage::from_json_slice(&bytes),
        };
        let message = match decoded {
            Ok(message) => message,
            Err(e) => break ReaderExit::Failed(RelayError::Decode(e.to_string())),
        };

        let envelope = Envelope {
            from: conn_id.clone(),
            message,
        };
        // Blocks while the inbound channel is full.
        let sent = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break ReaderExit::Shutdown,
            _ = closed.cancelled() => break ReaderExit::Evicted,
            sent = inbound.send(envelope) => sent,
        };
        if sent.is_err() {
            break ReaderExit::HubStopped;
        }
    };

    match &exit {
        ReaderExit::PeerClosed => info!(conn_id = %conn_id, "chat client disconnected"),
        ReaderExit::Failed(e) => {
            warn!(conn_id = %conn_id, kind = e.kind(), error = %e, "read failed, dropping connection")
        }
        ReaderExit::HubStopped => warn!(conn_id = %conn_id, "broadcast hub gone, dropping connection"),
        ReaderExit::Evicted => debug!(conn_id = %conn_id, "connection closed, reader stopped"),
        ReaderExit::Shutdown => debug!(conn_id = %conn_id, "reader stopped for shutdown"),
    }

    registry.remove(&conn_id).await;
    exit
}
