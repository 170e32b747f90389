//! Background event poller.
//!
//! # States
//! - Running: evaluate the registry, then sleep for the poll interval
//! - Suspended: waiting on the pause gate while any connection is open
//!
//! # State Transitions
//! ```text
//! Running → Suspended: first connection opens (gate closes)
//! Suspended → Running: last connection closes without an event (gate opens)
//! ```
//!
//! The poller is started once and lives until the process exits.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::lifecycle::state::ShutdownState;

const THREAD_NAME: &str = "exit-when-poller";

pub struct Poller {
    state: Arc<ShutdownState>,
    trigger: Arc<dyn ShutdownTrigger>,
}

impl Poller {
    pub fn new(state: Arc<ShutdownState>, trigger: Arc<dyn ShutdownTrigger>) -> Self {
        Self { state, trigger }
    }

    /// Start the poller on its own thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())
    }

    /// Poll forever.
    pub fn run(self) {
        tracing::debug!(
            interval_secs = self.state.poll_interval().as_secs_f64(),
            events = self.state.registry().len(),
            "Poller starting"
        );

        // cycle() releases the state lock, so even a zero interval leaves
        // room for the hooks between scans.
        loop {
            self.cycle();
            thread::sleep(self.state.poll_interval());
        }
    }

    /// Run one evaluation, waiting first if the pause gate is closed.
    ///
    /// Returns the exiting flag.
    pub fn cycle(&self) -> bool {
        let guard = self.state.lock();
        let mut guard = guard.wait_until_resumed();

        let exiting = guard.evaluate();
        if exiting && guard.request_shutdown(self.trigger.as_ref()) {
            tracing::debug!("Shutdown from polling thread");
        }
        exiting
    }
}
