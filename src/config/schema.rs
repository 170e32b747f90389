//! Configuration schema definitions.
//!
//! All types derive Serde traits so the same settings can come from a TOML
//! file or be assembled from `key=value` parameters.

use std::os::fd::RawFd;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default seconds between background checks.
pub const DEFAULT_POLL_SECS: u64 = 60;

/// Root settings for the `exit-when` binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Events and polling.
    pub exit_when: ExitWhenConfig,

    /// Demo host listener.
    pub host: HostConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Events to watch and how often to poll them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExitWhenConfig {
    /// Seconds between background checks.
    pub poll_secs: u64,

    /// Events in registration order.
    pub events: Vec<EventSpec>,
}

impl ExitWhenConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}

impl Default for ExitWhenConfig {
    fn default() -> Self {
        Self {
            poll_secs: DEFAULT_POLL_SECS,
            events: Vec::new(),
        }
    }
}

/// One event, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventSpec {
    FileCreated { path: PathBuf },
    FileDeleted { path: PathBuf },
    ProcessExits { pid: u32 },
    FdClosed { fd: RawFd },
    Script { command: String },
}

/// Listener settings for the demo host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Bind address (e.g., "127.0.0.1:10809").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:10809".to_string(),
            max_connections: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,

    /// Log filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            log_filter: "exit_when=debug".to_string(),
        }
    }
}
