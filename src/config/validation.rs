//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde and the parameter parser handle syntax)
//! - Validate value ranges (pids and descriptors in range)
//! - Reject empty paths and commands
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config
//! - Runs before any event resource is acquired

use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::{EventSpec, ExitWhenConfig, HostConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("event {index}: path is empty")]
    EmptyPath { index: usize },

    #[error("event {index}: file descriptor {fd} is negative")]
    NegativeDescriptor { index: usize, fd: i32 },

    #[error("event {index}: pid {pid} is out of range")]
    PidOutOfRange { index: usize, pid: u32 },

    #[error("event {index}: script command is empty")]
    EmptyCommand { index: usize },

    #[error("host: max_connections must be greater than 0")]
    ZeroMaxConnections,

    #[error("host: invalid bind address {0:?}")]
    BindAddress(String),
}

/// Check the event configuration.
pub fn validate_config(config: &ExitWhenConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, event) in config.events.iter().enumerate() {
        match event {
            EventSpec::FileCreated { path } | EventSpec::FileDeleted { path } => {
                if *path == PathBuf::new() {
                    errors.push(ValidationError::EmptyPath { index });
                }
            }
            EventSpec::ProcessExits { pid } => {
                if *pid == 0 || *pid > i32::MAX as u32 {
                    errors.push(ValidationError::PidOutOfRange { index, pid: *pid });
                }
            }
            EventSpec::FdClosed { fd } => {
                if *fd < 0 {
                    errors.push(ValidationError::NegativeDescriptor { index, fd: *fd });
                }
            }
            EventSpec::Script { command } => {
                if command.trim().is_empty() {
                    errors.push(ValidationError::EmptyCommand { index });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the demo host listener settings.
pub fn validate_host(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.bind_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
