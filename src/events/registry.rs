//! The ordered set of configured events.
//!
//! Built once while configuration is single-threaded and never modified
//! afterwards; the only operation is a scan in registration order.

use crate::config::loader::ConfigError;
use crate::config::schema::EventSpec;
use crate::events::source::{Event, EventKind, Outcome};
use crate::observability::metrics;

/// Registered events, in configuration order.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: Vec<Event>,
}

impl EventRegistry {
    /// Configure every event. The first failure aborts and releases the
    /// events already configured.
    pub fn from_specs(specs: &[EventSpec]) -> Result<Self, ConfigError> {
        let events = specs
            .iter()
            .map(Event::configure)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(events = events.len(), "Event registry configured");
        Ok(Self { events })
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Check events in order and return the kind of the first one that
    /// triggers. Later events are not checked in that pass.
    ///
    /// Soft errors are logged and otherwise ignored.
    pub fn scan(&self) -> Option<EventKind> {
        for event in &self.events {
            let kind = event.kind();
            metrics::record_check(kind);

            match event.check() {
                Outcome::Pending => {}
                Outcome::Observed => {
                    tracing::debug!(event = %kind, "Detected event");
                    metrics::record_observed(kind);
                    return Some(kind);
                }
                Outcome::HardError(e) => {
                    tracing::error!(event = %kind, error = %e, "Event misconfigured, treating as observed");
                    metrics::record_probe_error(kind, "hard");
                    metrics::record_observed(kind);
                    return Some(kind);
                }
                Outcome::SoftError(e) => {
                    tracing::error!(event = %kind, error = %e, "Event check failed");
                    metrics::record_probe_error(kind, "soft");
                }
            }
        }
        None
    }
}
