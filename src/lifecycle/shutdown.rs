//! Shutdown coordination for the host.

use tokio::sync::watch;

/// The host's process-wide shutdown primitive.
///
/// The lifecycle gate calls this at most once.
pub trait ShutdownTrigger: Send + Sync {
    fn shutdown(&self);
}

/// Coordinator for graceful shutdown.
///
/// Provides a watch channel that all long-running tasks can subscribe to.
/// Subscribers that arrive after the trigger still observe it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger for Shutdown {
    fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.trigger();
    }
}

/// Wait until `rx` observes the shutdown signal.
///
/// Returns immediately if it was already triggered.
pub async fn triggered(rx: &mut watch::Receiver<bool>) {
    // An error means the coordinator is gone, which is as final as a trigger.
    let _ = rx.wait_for(|fired| *fired).await;
}
