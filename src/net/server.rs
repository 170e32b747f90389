//! Demo host server.
//!
//! # Responsibilities
//! - Accept TCP connections within the configured limit
//! - Run each connection through the lifecycle hooks
//! - Echo lines back to the peer while the connection is open
//! - Stop accepting when shutdown is triggered, then drain
//!
//! The hooks block (they may run event scripts), so they are called on the
//! blocking thread pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::lifecycle::gate::{LifecycleGate, OpenConnection};
use crate::lifecycle::shutdown::triggered;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Sent to a peer whose connection is refused because the server is exiting.
pub const REJECTION_MESSAGE: &[u8] = b"server is exiting\n";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Line-echo server driving a [`LifecycleGate`].
pub struct Server {
    gate: Arc<LifecycleGate>,
    listener: Listener,
    tracker: ConnectionTracker,
}

impl Server {
    pub fn new(gate: Arc<LifecycleGate>, listener: Listener) -> Self {
        Self {
            gate,
            listener,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = triggered(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr, permit)) => {
                        let gate = Arc::clone(&self.gate);
                        let guard = self.tracker.track();
                        tokio::spawn(async move {
                            serve_connection(gate, stream, addr).await;
                            drop(permit);
                            drop(guard);
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                    Err(e) => return Err(e.into()),
                },
            }
        }

        tracing::info!(
            active = self.tracker.active_count(),
            "Stopped accepting connections"
        );
        if !self.tracker.wait_for_drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        Ok(())
    }
}

async fn serve_connection(gate: Arc<LifecycleGate>, mut stream: TcpStream, peer: SocketAddr) {
    let admit = Arc::clone(&gate);
    let admitted = tokio::task::spawn_blocking(move || {
        admit.on_preconnect(false)?;
        admit.on_connection_open(false, "")
    })
    .await;

    let connection = match admitted {
        Ok(Ok(ticket)) => OpenConnection::new(gate, ticket),
        Ok(Err(e)) => {
            tracing::warn!(peer_addr = %peer, error = %e, "Connection rejected");
            let _ = stream.write_all(REJECTION_MESSAGE).await;
            return;
        }
        Err(e) => {
            tracing::error!(peer_addr = %peer, error = %e, "Connection hook failed");
            return;
        }
    };

    let connection_id = connection.id();
    tracing::debug!(peer_addr = %peer, connection_id = %connection_id, "Serving connection");

    // If this task unwinds, dropping `connection` still runs the close hook.
    if let Err(e) = echo(stream).await {
        tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
    }

    if let Err(e) = tokio::task::spawn_blocking(move || connection.close()).await {
        tracing::error!(connection_id = %connection_id, error = %e, "Close hook failed");
    }
}

async fn echo(stream: TcpStream) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}
