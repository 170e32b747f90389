//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (deserialize into Settings)
//! key=value parameters
//!     → loader.rs (parse_param: event, poll interval, or pass-through)
//!     → unrecognized keys forwarded to the next consumer (ConfigNext)
//!     → validation.rs (semantic checks)
//!     → events::EventRegistry::from_specs (acquire probe resources)
//! ```
//!
//! # Design Decisions
//! - Config is consumed once, before any thread is started
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (parsing) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigNext};
pub use schema::{EventSpec, ExitWhenConfig, HostConfig, ObservabilityConfig, Settings};
