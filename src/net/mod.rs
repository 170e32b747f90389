//! Network layer: the demo host.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → server.rs (preconnect + open hooks, echo, close hook)
//!     → connection.rs (ids, drain tracking)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Every admitted connection is paired with exactly one close hook

pub mod connection;
pub mod listener;
pub mod server;

pub use listener::Listener;
pub use server::Server;
