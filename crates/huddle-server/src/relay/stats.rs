use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Relay counters. Updated lock-free from the hub and the readers.
#[derive(Debug, Default)]
pub struct RelayStats {
    connections_accepted: AtomicU64,
    disconnects: AtomicU64,
    messages_relayed: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub disconnects: u64,
    pub messages_relayed: u64,
    pub deliveries: u64,
    pub evictions: u64,
}

impl RelayStats {
    pub fn record_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fan_out(&self, delivered: usize, evicted: usize) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
