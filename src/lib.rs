//! Event-triggered shutdown for long-running servers.
//!
//! Watches a configured set of external conditions (a file appearing or
//! disappearing, a process exiting, a pipe closing, a script reporting
//! exit code 88) and, once any one of them is observed, stops the server
//! in an orderly way: new connections are refused and the host's shutdown
//! primitive is invoked when the last open connection drains.

pub mod config;
pub mod events;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::{ExitWhenConfig, Settings};
pub use events::{Event, EventRegistry, Outcome};
pub use lifecycle::{LifecycleGate, Readiness, Shutdown, ShutdownTrigger};
