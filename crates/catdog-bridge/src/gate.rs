//! One-shot initialization gate.

use std::sync::Arc;

use tokio::sync::watch;

/// A latch that starts *pending* and flips to *ready* exactly once.
///
/// Any number of tasks may wait on the gate concurrently; all of them are
/// released when it opens, and later waiters pass straight through. Clones
/// share the same state.
#[derive(Debug, Clone)]
pub struct InitGate {
    ready: Arc<watch::Sender<bool>>,
}

impl InitGate {
    /// A gate in the pending state.
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            ready: Arc::new(ready),
        }
    }

    /// Open the gate, releasing all current and future waiters.
    ///
    /// # Panics
    ///
    /// Panics if the gate is already open.
    pub fn signal_ready(&self) {
        let was_ready = self.ready.send_replace(true);
        assert!(!was_ready, "initialization gate signaled twice");
    }

    /// Wait until the gate is open.
    pub async fn await_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}
