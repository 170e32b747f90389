//! Metrics collection and exposition.
//!
//! # Metrics
//! - `exitwhen_checks_total` (counter): event probes run, by kind
//! - `exitwhen_events_observed_total` (counter): probes that triggered, by kind
//! - `exitwhen_probe_errors_total` (counter): failed probes, by kind and severity
//! - `exitwhen_active_connections` (gauge): connections counted by the gate
//! - `exitwhen_rejected_connections_total` (counter): connections refused while exiting
//! - `exitwhen_shutdowns_total` (counter): shutdown requests issued

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::events::EventKind;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_check(kind: EventKind) {
    counter!("exitwhen_checks_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_observed(kind: EventKind) {
    counter!("exitwhen_events_observed_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_probe_error(kind: EventKind, severity: &'static str) {
    counter!(
        "exitwhen_probe_errors_total",
        "kind" => kind.as_str(),
        "severity" => severity
    )
    .increment(1);
}

pub fn set_active_connections(count: u32) {
    gauge!("exitwhen_active_connections").set(count as f64);
}

pub fn record_rejected_connection() {
    counter!("exitwhen_rejected_connections_total").increment(1);
}

pub fn record_shutdown() {
    counter!("exitwhen_shutdowns_total").increment(1);
}
