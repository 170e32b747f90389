//! Event sources subsystem.
//!
//! # Data Flow
//! ```text
//! EventSpec (config)
//!     → source.rs (Event::configure: resolve path, open probe handle)
//!     → registry.rs (EventRegistry, frozen after configuration)
//!     → scanned by lifecycle::state on every evaluate()
//!
//! ScriptExit probes:
//!     → script.rs (run command, translate exit status)
//! ```
//!
//! # Design Decisions
//! - Every probe resource is opened once at configuration and reused
//! - Probe failures never escape a check: they become an `Outcome`
//! - An invalid descriptor is a hard error and counts as observed

pub mod registry;
pub mod script;
pub mod source;

pub use registry::EventRegistry;
pub use source::{Event, EventError, EventKind, Outcome};
