//! Lifecycle hooks called by the host server.
//!
//! # Responsibilities
//! - Exit early when an event is already satisfied at readiness time
//! - Start the poller once the host has forked
//! - Refuse new connections once the server is exiting
//! - Count open connections and suspend the poller while any are open
//! - Re-check events on close and shut down when the last connection drains
//!
//! # Hook Order (per connection)
//! ```text
//! on_preconnect → on_connection_open → ... data transfer ... → on_connection_close
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::lifecycle::poller::Poller;
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::lifecycle::state::ShutdownState;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;

/// Failure reported through a lifecycle hook.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("server is exiting: rejecting new connection")]
    Exiting,

    #[error("failed to start poller thread: {0}")]
    SpawnPoller(std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

/// The host's own handlers, called after this layer has made its decision.
///
/// Every method defaults to success.
pub trait NextHandler: Send + Sync {
    fn get_ready(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn after_fork(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn preconnect(&self, _readonly: bool) -> Result<(), HostError> {
        Ok(())
    }

    fn open(&self, _readonly: bool, _export: &str) -> Result<(), HostError> {
        Ok(())
    }
}

/// A host with no handlers of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl NextHandler for PassThrough {}

/// Result of the readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No event yet; carry on starting up.
    Proceed,
    /// An event is already satisfied; exit successfully without serving.
    Exit,
}

/// Proof that a connection was counted by [`LifecycleGate::on_connection_open`].
///
/// Handing it back to [`LifecycleGate::on_connection_close`] consumes it, so
/// a connection is uncounted at most once.
#[derive(Debug)]
#[must_use = "pass the ticket to on_connection_close when the connection ends"]
pub struct ConnectionTicket {
    id: ConnectionId,
}

impl ConnectionTicket {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The set of hooks the host calls at fixed points in its lifecycle.
pub struct LifecycleGate {
    state: Arc<ShutdownState>,
    next: Arc<dyn NextHandler>,
    trigger: Arc<dyn ShutdownTrigger>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleGate {
    pub fn new(
        state: Arc<ShutdownState>,
        next: Arc<dyn NextHandler>,
        trigger: Arc<dyn ShutdownTrigger>,
    ) -> Self {
        Self {
            state,
            next,
            trigger,
            poller: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<ShutdownState> {
        &self.state
    }

    /// Called once before the host starts accepting connections.
    pub fn on_readiness_check(&self) -> Result<Readiness, HostError> {
        let mut guard = self.state.lock();
        if guard.evaluate() {
            tracing::info!("Event already satisfied at startup, exiting");
            return Ok(Readiness::Exit);
        }
        self.next.get_ready()?;
        Ok(Readiness::Proceed)
    }

    /// Called after the host has forked (if it does). Starts the poller.
    ///
    /// Calling it again does not start a second poller.
    pub fn on_after_fork(&self) -> Result<(), HostError> {
        {
            let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
            if poller.is_none() {
                let handle = Poller::new(Arc::clone(&self.state), Arc::clone(&self.trigger))
                    .spawn()
                    .map_err(HostError::SpawnPoller)?;
                *poller = Some(handle);
            }
        }
        self.next.after_fork()
    }

    /// Called before each new connection is served.
    pub fn on_preconnect(&self, readonly: bool) -> Result<(), HostError> {
        let mut guard = self.state.lock();
        if guard.evaluate() {
            tracing::error!("Server is exiting: rejecting new connection");
            metrics::record_rejected_connection();
            return Err(HostError::Exiting);
        }
        self.next.preconnect(readonly)
    }

    /// Called once the host has otherwise accepted a connection.
    pub fn on_connection_open(&self, readonly: bool, export: &str) -> Result<ConnectionTicket, HostError> {
        self.next.open(readonly, export)?;

        let mut guard = self.state.lock();
        if guard.connection_opened() == 1 {
            guard.suspend_poller();
        }
        let ticket = ConnectionTicket { id: ConnectionId::new() };
        tracing::trace!(
            connection_id = %ticket.id,
            active = guard.active_connections(),
            "Connection opened"
        );
        Ok(ticket)
    }

    /// Called when a connection ends.
    pub fn on_connection_close(&self, ticket: ConnectionTicket) {
        let mut guard = self.state.lock();

        // Catches events that happened while the poller was suspended.
        guard.evaluate();

        let remaining = guard.connection_closed();
        tracing::trace!(connection_id = %ticket.id, active = remaining, "Connection closed");

        if remaining == 0 {
            if guard.exiting() {
                if guard.request_shutdown(self.trigger.as_ref()) {
                    tracing::debug!("Exiting on last client connection");
                }
            } else {
                guard.resume_poller();
            }
        }
    }
}

/// An admitted connection that is closed through its gate when dropped.
///
/// The close hook runs even if the task serving the connection unwinds, so
/// the poller is never left suspended by a connection that no longer exists.
#[must_use = "dropping an open connection closes it immediately"]
pub struct OpenConnection {
    gate: Arc<LifecycleGate>,
    id: ConnectionId,
    ticket: Option<ConnectionTicket>,
}

impl OpenConnection {
    pub fn new(gate: Arc<LifecycleGate>, ticket: ConnectionTicket) -> Self {
        Self {
            gate,
            id: ticket.id(),
            ticket: Some(ticket),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run the close hook now.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.gate.on_connection_close(ticket);
        }
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.finish();
    }
}
