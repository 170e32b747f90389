//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use exit_when::events::{Event, EventRegistry};
use exit_when::lifecycle::{HostError, LifecycleGate, NextHandler, ShutdownState, ShutdownTrigger};

/// Shutdown primitive that counts invocations.
#[derive(Default)]
pub struct CountingTrigger {
    count: Mutex<usize>,
    changed: Condvar,
}

impl CountingTrigger {
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }

    /// Wait until shutdown has been invoked at least once.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap();
        let (_count, result) = self
            .changed
            .wait_timeout_while(count, timeout, |count| *count == 0)
            .unwrap();
        !result.timed_out()
    }
}

impl ShutdownTrigger for CountingTrigger {
    fn shutdown(&self) {
        *self.count.lock().unwrap() += 1;
        self.changed.notify_all();
    }
}

/// Host handler that records which hooks reached it.
#[derive(Default)]
pub struct RecordingNext {
    calls: Mutex<Vec<&'static str>>,
    reject_open: bool,
}

impl RecordingNext {
    pub fn rejecting_open() -> Self {
        Self {
            reject_open: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, hook: &'static str) {
        self.calls.lock().unwrap().push(hook);
    }
}

impl NextHandler for RecordingNext {
    fn get_ready(&self) -> Result<(), HostError> {
        self.record("get_ready");
        Ok(())
    }

    fn after_fork(&self) -> Result<(), HostError> {
        self.record("after_fork");
        Ok(())
    }

    fn preconnect(&self, _readonly: bool) -> Result<(), HostError> {
        self.record("preconnect");
        Ok(())
    }

    fn open(&self, _readonly: bool, _export: &str) -> Result<(), HostError> {
        self.record("open");
        if self.reject_open {
            return Err(HostError::Rejected("open refused by host".into()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub gate: Arc<LifecycleGate>,
    pub trigger: Arc<CountingTrigger>,
    pub next: Arc<RecordingNext>,
}

impl Harness {
    pub fn new(events: Vec<Event>, poll_interval: Duration) -> Self {
        Self::with_next(events, poll_interval, RecordingNext::default())
    }

    pub fn with_next(events: Vec<Event>, poll_interval: Duration, next: RecordingNext) -> Self {
        let state = Arc::new(ShutdownState::new(
            EventRegistry::from_events(events),
            poll_interval,
        ));
        let trigger = Arc::new(CountingTrigger::default());
        let next = Arc::new(next);
        let gate = Arc::new(LifecycleGate::new(
            state,
            Arc::clone(&next) as Arc<dyn NextHandler>,
            Arc::clone(&trigger) as Arc<dyn ShutdownTrigger>,
        ));
        Self { gate, trigger, next }
    }

    pub fn trigger_handle(&self) -> Arc<dyn ShutdownTrigger> {
        Arc::clone(&self.trigger) as Arc<dyn ShutdownTrigger>
    }
}
