use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::ConnectionRegistry;
use super::stats::RelayStats;
use super::{Envelope, RelayConfig};

/// Outcome of delivering one message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Failed recipients this fan-out actually removed (a reader may have
    /// beaten it to the removal).
    pub evicted: usize,
}

/// Single consumer of the inbound channel.
///
/// Takes one message at a time and writes it to every connection in a fresh
/// registry snapshot. The next message is not taken until every write for
/// the current one has finished, so each recipient sees messages in inbound
/// order.
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<RelayStats>,
    inbound: mpsc::Receiver<Envelope>,
    echo_to_sender: bool,
    shutdown: CancellationToken,
}

impl BroadcastHub {
    /// Create a hub and the sending side of its inbound channel.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        stats: Arc<RelayStats>,
        config: &RelayConfig,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::Sender<Envelope>) {
        let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));
        let hub = Self {
            registry,
            stats,
            inbound: rx,
            echo_to_sender: config.echo_to_sender,
            shutdown,
        };
        (hub, tx)
    }

    /// Run until shutdown is requested or every sender is dropped.
    pub async fn run(mut self) {
        info!(echo_to_sender = self.echo_to_sender, "broadcast hub started");
        loop {
            let envelope = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("broadcast hub shutting down");
                    break;
                }
                received = self.inbound.recv() => match received {
                    Some(envelope) => envelope,
                    None => {
                        info!("inbound channel closed, broadcast hub stopping");
                        break;
                    }
                },
            };

            let report = self.fan_out(&envelope).await;
            debug!(
                from = %envelope.from,
                recipients = report.recipients,
                delivered = report.delivered,
                evicted = report.evicted,
                "message relayed"
            );
        }
    }

    /// Deliver one message to the current registry snapshot.
    ///
    /// A failed write evicts that connection and nothing else.
    pub async fn fan_out(&self, envelope: &Envelope) -> FanOut {
        let recipients: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|conn| self.echo_to_sender || *conn.id() != envelope.from)
            .collect();

        let message = &envelope.message;
        let results = join_all(
            recipients
                .iter()
                .map(|conn| async move { (conn, conn.send(message).await) }),
        )
        .await;

        let mut report = FanOut {
            recipients: recipients.len(),
            ..Default::default()
        };
        for (conn, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(conn_id = %conn.id(), kind = e.kind(), error = %e, "write failed, evicting connection");
                    if self.registry.remove(conn.id()).await {
                        report.evicted += 1;
                    }
                }
            }
        }

        self.stats.record_fan_out(report.delivered, report.evicted);
        report
    }
}
