//! Notification sink for accumulated failures.

use anyhow::Result;
use std::sync::{Arc, Mutex};

/// External channel the store reports failure summaries to. The sink owns its
/// own delivery/retry policy; the store sends each message exactly once.
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    /// Returns an error if delivery fails.
    fn send(&self, message: &str) -> Result<()>;
}

/// Recording sink for tests: every message is kept in memory.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("message list mutex poisoned")
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, message: &str) -> Result<()> {
        self.messages
            .lock()
            .expect("message list mutex poisoned")
            .push(message.to_string());
        Ok(())
    }
}
