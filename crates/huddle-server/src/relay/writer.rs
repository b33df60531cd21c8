use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use huddle_core::{ChatMessage, ConnId};

use super::{ChatConnection, RelayError};

/// Write half of a chat connection.
///
/// Wraps any `Sink<ws::Message>`; in production this is the sending half of
/// a split axum `WebSocket`. Only the hub writes, so the mutex is contended
/// only by `close`.
///
/// Closing cancels the token returned by [`SinkConnection::close_signal`];
/// the connection's reader watches it so an evicted participant stops
/// publishing as soon as its write side is gone.
pub struct SinkConnection<S> {
    id: ConnId,
    sink: Mutex<S>,
    closed: AtomicBool,
    close_signal: CancellationToken,
}

impl<S> SinkConnection<S> {
    pub fn new(id: ConnId, sink: S) -> Self {
        Self {
            id,
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            close_signal: CancellationToken::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Cancelled on the first `close`.
    pub fn close_signal(&self) -> CancellationToken {
        self.close_signal.clone()
    }
}

#[async_trait]
impl<S> ChatConnection for SinkConnection<S>
where
    S: Sink<WsMessage> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    fn id(&self) -> &ConnId {
        &self.id
    }

    async fn send(&self, message: &ChatMessage) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::Closed);
        }
        let text = message
            .to_json()
            .map_err(|e| RelayError::Encode(e.to_string()))?;

        let mut sink = self.sink.lock().await;
        if self.is_closed() {
            return Err(RelayError::Closed);
        }
        sink.send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        trace!(conn_id = %self.id, "message written");
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.close_signal.cancel();
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!(conn_id = %self.id, error = %e, "error closing connection");
        }
    }
}
