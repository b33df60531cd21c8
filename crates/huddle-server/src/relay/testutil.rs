//! In-memory connections for relay tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use huddle_core::{ChatMessage, ConnId};

use super::{ChatConnection, RelayError};

/// Records every message written to it; can be told to fail writes.
pub struct FakeConnection {
    id: ConnId,
    received: Mutex<Vec<ChatMessage>>,
    fail_writes: AtomicBool,
    closes: AtomicUsize,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnId::new(),
            received: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        let conn = Self::new();
        conn.break_transport();
        conn
    }

    pub fn break_transport(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<ChatMessage> {
        self.received.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatConnection for FakeConnection {
    fn id(&self) -> &ConnId {
        &self.id
    }

    async fn send(&self, message: &ChatMessage) -> Result<(), RelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("broken pipe".into()));
        }
        self.received.lock().push(message.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
