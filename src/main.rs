//! exit-when: a line-echo server that shuts itself down when an external
//! event happens.
//!
//! # Architecture Overview
//!
//! ```text
//!   key=value params ──┐
//!   --config file ─────┴─▶ config ──▶ events::EventRegistry
//!                                        │
//!                                        ▼
//!                              lifecycle::ShutdownState ◀── poller thread
//!                                        ▲
//!   client ──▶ net::Listener ──▶ net::Server ──▶ lifecycle::LifecycleGate
//!                                                  (preconnect/open/close)
//! ```
//!
//! Example:
//!
//! ```text
//! exit-when listen=127.0.0.1:10809 exit-when-file-created=/run/stop exit-when-poll=5
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use exit_when::config::loader::load_settings;
use exit_when::config::validation::validate_host;
use exit_when::config::{ConfigError, Settings};
use exit_when::lifecycle::signals::shutdown_on_signal;
use exit_when::lifecycle::startup::build_gate;
use exit_when::lifecycle::{PassThrough, Readiness, Shutdown};
use exit_when::net::{Listener, Server};
use exit_when::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "exit-when")]
#[command(about = "Serve until an external event says to stop", long_about = None)]
struct Cli {
    /// TOML settings file, applied before the parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parameters of the form key=value (exit-when-*, listen, max-connections).
    params: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    settings
        .exit_when
        .apply_params(cli.params.iter().map(String::as_str), &mut settings.host)?;
    validate_host(&settings.host).map_err(ConfigError::Validation)?;

    logging::init_logging(&settings.observability.log_filter);
    tracing::info!("exit-when v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let gate = Arc::new(build_gate(
        &settings.exit_when,
        Arc::new(PassThrough),
        Arc::new(shutdown.clone()),
    )?);

    let readiness = {
        let gate = Arc::clone(&gate);
        tokio::task::spawn_blocking(move || gate.on_readiness_check()).await??
    };
    if readiness == Readiness::Exit {
        std::process::exit(0);
    }

    let listener = Listener::bind(&settings.host).await?;
    gate.on_after_fork()?;

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = Server::new(gate, listener);
    server.run(shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
