use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use huddle_core::ConnId;

use super::ChatConnection;

/// The live set of chat connections eligible to receive broadcasts.
///
/// Every operation takes the lock for a short synchronous section and
/// never holds it across an `.await`. A connection is closed only by the
/// caller that actually took it out of the map, so racing removals close
/// it exactly once.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnId, Arc<dyn ChatConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns false (and changes nothing) if a
    /// connection with the same id is already present.
    pub fn add(&self, conn: Arc<dyn ChatConnection>) -> bool {
        let mut conns = self.connections.write();
        match conns.entry(conn.id().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(conn);
                true
            }
        }
    }

    /// Remove a connection and close it. Removing an absent id is a no-op
    /// that returns false.
    pub async fn remove(&self, id: &ConnId) -> bool {
        let removed = self.connections.write().remove(id);
        match removed {
            Some(conn) => {
                conn.close().await;
                debug!(conn_id = %id, "connection removed");
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the registered connections.
    pub fn snapshot(&self) -> Vec<Arc<dyn ChatConnection>> {
        self.connections.read().values().cloned().collect()
    }

    pub fn contains(&self, id: &ConnId) -> bool {
        self.connections.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<ConnId> {
        self.connections.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the registry and close every connection. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.connections.write().drain().map(|(_, c)| c).collect();
        let count = drained.len();
        futures::future::join_all(drained.iter().map(|conn| conn.close())).await;
        count
    }
}
