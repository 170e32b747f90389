//! Shared shutdown state.
//!
//! # State
//! - `exiting`: latch, false → true exactly once, never reset
//! - `active_connections`: connections counted between open and close
//! - `poller_suspended`: the pause gate; the poller waits while it is set
//! - `shutdown_requested`: the host's shutdown primitive has been invoked
//!
//! # Lock Order
//! ```text
//! state lock → pause gate (condition variable on the same lock)
//! ```
//! The poller waits on the pause gate only while holding the state lock, and
//! the wait releases that lock, so a closing connection can always get in to
//! resume it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::events::EventRegistry;
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::observability::metrics;

#[derive(Debug, Default)]
struct Inner {
    exiting: bool,
    active_connections: u32,
    poller_suspended: bool,
    shutdown_requested: bool,
}

/// Authoritative record of whether shutdown has been decided.
///
/// Owns the frozen event registry; every scan happens under the state lock.
#[derive(Debug)]
pub struct ShutdownState {
    inner: Mutex<Inner>,
    resumed: Condvar,
    registry: EventRegistry,
    poll_interval: Duration,
}

impl ShutdownState {
    pub fn new(registry: EventRegistry, poll_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            resumed: Condvar::new(),
            registry,
            poll_interval,
        }
    }

    /// Acquire the state lock.
    pub fn lock(&self) -> StateGuard<'_> {
        // The guarded fields are plain flags and a counter; a panic while
        // holding the lock cannot leave them half-written.
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        StateGuard { state: self, inner }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }
}

/// Exclusive access to the shutdown state.
pub struct StateGuard<'a> {
    state: &'a ShutdownState,
    inner: MutexGuard<'a, Inner>,
}

impl<'a> StateGuard<'a> {
    /// Return the exiting flag, scanning the registry first if it is not yet set.
    ///
    /// Once this returns true it returns true forever without scanning.
    pub fn evaluate(&mut self) -> bool {
        if self.inner.exiting {
            return true;
        }
        if let Some(kind) = self.state.registry.scan() {
            tracing::info!(event = %kind, "Event observed, server is exiting");
            self.inner.exiting = true;
        }
        self.inner.exiting
    }

    pub fn exiting(&self) -> bool {
        self.inner.exiting
    }

    pub fn active_connections(&self) -> u32 {
        self.inner.active_connections
    }

    pub fn poller_suspended(&self) -> bool {
        self.inner.poller_suspended
    }

    pub fn shutdown_requested(&self) -> bool {
        self.inner.shutdown_requested
    }

    /// Count a new connection and return the new total.
    pub(crate) fn connection_opened(&mut self) -> u32 {
        self.inner.active_connections += 1;
        metrics::set_active_connections(self.inner.active_connections);
        self.inner.active_connections
    }

    /// Forget a connection and return the remaining total.
    pub(crate) fn connection_closed(&mut self) -> u32 {
        self.inner.active_connections = self.inner.active_connections.saturating_sub(1);
        metrics::set_active_connections(self.inner.active_connections);
        self.inner.active_connections
    }

    /// Close the pause gate.
    pub(crate) fn suspend_poller(&mut self) {
        self.inner.poller_suspended = true;
    }

    /// Open the pause gate and wake the poller if it is waiting on it.
    pub(crate) fn resume_poller(&mut self) {
        self.inner.poller_suspended = false;
        self.state.resumed.notify_all();
    }

    /// Block until the pause gate is open. The state lock is released while
    /// waiting and held again on return.
    pub(crate) fn wait_until_resumed(self) -> Self {
        let StateGuard { state, inner } = self;
        let inner = state
            .resumed
            .wait_while(inner, |inner| inner.poller_suspended)
            .unwrap_or_else(PoisonError::into_inner);
        StateGuard { state, inner }
    }

    /// Invoke the host's shutdown primitive unless it already has been.
    ///
    /// Returns true if this call invoked it.
    pub(crate) fn request_shutdown(&mut self, trigger: &dyn ShutdownTrigger) -> bool {
        if self.inner.shutdown_requested {
            return false;
        }
        self.inner.shutdown_requested = true;
        metrics::record_shutdown();
        trigger.shutdown();
        true
    }
}
