//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build event registry → Shared state → Lifecycle gate
//!
//! Host lifecycle (gate.rs):
//!     readiness check → after fork (start poller.rs) →
//!     per connection: preconnect → open → close
//!
//! Shutdown (shutdown.rs):
//!     Event latched → last connection drains (or poller sees it idle) →
//!     host shutdown primitive invoked once
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → same shutdown primitive
//! ```
//!
//! # Design Decisions
//! - One lock guards all mutable state; the pause gate is a condition
//!   variable on that same lock
//! - The exiting flag is a latch: set once, never cleared
//! - The poller only scans while no connection is open

pub mod gate;
pub mod poller;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use gate::{
    ConnectionTicket, HostError, LifecycleGate, NextHandler, OpenConnection, PassThrough, Readiness,
};
pub use poller::Poller;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use state::{ShutdownState, StateGuard};
