//! Configuration loading from parameters and disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{EventSpec, ExitWhenConfig, HostConfig, Settings};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{key}: could not parse {value:?}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("parameter {0:?} is not of the form key=value")]
    MalformedParameter(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("{key}: {}: {source}", .path.display())]
    ResolvePath {
        key: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("exit-when-process-exits: {}: {source}", .path.display())]
    OpenProcess { path: PathBuf, source: io::Error },

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The next consumer of parameters this crate does not recognize.
pub trait ConfigNext {
    fn config(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;
}

/// What a single `key=value` parameter means to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Event(EventSpec),
    PollInterval(u64),
    PassThrough,
}

/// Classify one parameter.
pub fn parse_param(key: &str, value: &str) -> Result<Param, ConfigError> {
    let param = match key {
        "exit-when-file-created" => Param::Event(EventSpec::FileCreated {
            path: PathBuf::from(value),
        }),
        "exit-when-file-deleted" => Param::Event(EventSpec::FileDeleted {
            path: PathBuf::from(value),
        }),
        "exit-when-pipe-closed" | "exit-when-fd-closed" => Param::Event(EventSpec::FdClosed {
            fd: parse_number("exit-when-pipe-closed", value)?,
        }),
        "exit-when-process-exits" | "exit-when-pid-exits" => {
            Param::Event(EventSpec::ProcessExits {
                pid: parse_number("exit-when-process-exits", value)?,
            })
        }
        "exit-when-script" => Param::Event(EventSpec::Script {
            command: value.to_string(),
        }),
        "exit-when-poll" => Param::PollInterval(parse_number("exit-when-poll", value)?),
        _ => Param::PassThrough,
    };
    Ok(param)
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if value.starts_with('+') {
        return Err(invalid(key, value, "unexpected sign"));
    }
    value.parse().map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a command line parameter at its first `=`.
pub fn split_param(param: &str) -> Result<(&str, &str), ConfigError> {
    match param.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(ConfigError::MalformedParameter(param.to_string())),
    }
}

impl ExitWhenConfig {
    /// Apply one parameter, forwarding unrecognized keys to `next`.
    pub fn apply_param(
        &mut self,
        key: &str,
        value: &str,
        next: &mut dyn ConfigNext,
    ) -> Result<(), ConfigError> {
        match parse_param(key, value)? {
            Param::Event(spec) => self.events.push(spec),
            Param::PollInterval(secs) => self.poll_secs = secs,
            Param::PassThrough => next.config(key, value)?,
        }
        Ok(())
    }

    /// Apply `key=value` parameters in order.
    pub fn apply_params<'a, I>(&mut self, params: I, next: &mut dyn ConfigNext) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for param in params {
            let (key, value) = split_param(param)?;
            self.apply_param(key, value, next)?;
        }
        Ok(())
    }
}

/// The demo host understands its listener settings and nothing else.
impl ConfigNext for HostConfig {
    fn config(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "listen" => self.bind_address = value.to_string(),
            "max-connections" => self.max_connections = parse_number(key, value)?,
            _ => return Err(ConfigError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}

/// Load settings from a TOML file and validate the event section.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let settings = load_settings(path)?;
    validate_config(&settings.exit_when).map_err(ConfigError::Validation)?;
    Ok(settings)
}
