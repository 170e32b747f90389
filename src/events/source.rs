//! Configured events and their probes.
//!
//! # Responsibilities
//! - Own the resource each event needs (path, descriptor, command)
//! - Answer "has this happened yet?" cheaply and repeatedly
//! - Classify probe failures as soft (retry next time) or hard (treat as triggered)
//! - Release the resource exactly once when the event is dropped

#[cfg(target_os = "linux")]
use std::fs::File;
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::schema::EventSpec;
use crate::events::script::{describe_exit_status, run_script, EVENT_EXIT_CODE};

/// The kind of condition an event watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileCreated,
    FileDeleted,
    ProcessExits,
    FdClosed,
    ScriptExit,
}

impl EventKind {
    /// Parameter name that registers this kind of event.
    pub fn param_name(&self) -> &'static str {
        match self {
            EventKind::FileCreated => "exit-when-file-created",
            EventKind::FileDeleted => "exit-when-file-deleted",
            EventKind::ProcessExits => "exit-when-process-exits",
            EventKind::FdClosed => "exit-when-pipe-closed",
            EventKind::ScriptExit => "exit-when-script",
        }
    }

    /// Short label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FileCreated => "file_created",
            EventKind::FileDeleted => "file_deleted",
            EventKind::ProcessExits => "process_exits",
            EventKind::FdClosed => "fd_closed",
            EventKind::ScriptExit => "script",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.param_name())
    }
}

/// A probe failure.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("access: {}: {errno}", .path.display())]
    Access { path: PathBuf, errno: Errno },

    #[error("read: {0}")]
    ProcessRead(io::Error),

    #[error("kill: {0}")]
    ProcessSignal(Errno),

    #[error("poll: {0}")]
    Poll(Errno),

    #[error("invalid file descriptor {0}")]
    InvalidDescriptor(RawFd),

    #[error("{command}: {source}")]
    ScriptSpawn { command: String, source: io::Error },

    #[error("{command}: {status}")]
    ScriptStatus { command: String, status: String },
}

/// Result of checking one event.
#[derive(Debug)]
pub enum Outcome {
    /// The event has happened.
    Observed,
    /// The event has not happened yet.
    Pending,
    /// The probe failed transiently; treated as pending.
    SoftError(EventError),
    /// The probe failed because the event is misconfigured; treated as observed.
    HardError(EventError),
}

impl Outcome {
    /// Whether this outcome latches the exiting flag.
    pub fn triggers(&self) -> bool {
        matches!(self, Outcome::Observed | Outcome::HardError(_))
    }
}

/// One configured event.
#[derive(Debug)]
pub enum Event {
    FileCreated { path: PathBuf },
    FileDeleted { path: PathBuf },
    ProcessExits(ProcessProbe),
    FdClosed(WatchedFd),
    ScriptExit { command: String },
}

impl Event {
    /// Build an event from its configuration, acquiring whatever it needs to probe.
    pub fn configure(spec: &EventSpec) -> Result<Self, ConfigError> {
        match spec {
            EventSpec::FileCreated { path } => Ok(Event::FileCreated {
                path: resolve(EventKind::FileCreated, path)?,
            }),
            EventSpec::FileDeleted { path } => Ok(Event::FileDeleted {
                path: resolve(EventKind::FileDeleted, path)?,
            }),
            EventSpec::ProcessExits { pid } => Ok(Event::ProcessExits(ProcessProbe::open(*pid)?)),
            // The descriptor is inherited; from here on the event owns it.
            EventSpec::FdClosed { fd } => Ok(Event::FdClosed(WatchedFd::new(*fd))),
            EventSpec::Script { command } => Ok(Event::ScriptExit {
                command: command.clone(),
            }),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::FileCreated { .. } => EventKind::FileCreated,
            Event::FileDeleted { .. } => EventKind::FileDeleted,
            Event::ProcessExits(_) => EventKind::ProcessExits,
            Event::FdClosed(_) => EventKind::FdClosed,
            Event::ScriptExit { .. } => EventKind::ScriptExit,
        }
    }

    /// Probe the event once.
    ///
    /// Only `ScriptExit` has side effects: it runs its command every time.
    pub fn check(&self) -> Outcome {
        match self {
            Event::FileCreated { path } => check_file_created(path),
            Event::FileDeleted { path } => check_file_deleted(path),
            Event::ProcessExits(probe) => probe.check(),
            Event::FdClosed(fd) => fd.check(),
            Event::ScriptExit { command } => check_script(command),
        }
    }
}

fn resolve(kind: EventKind, path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path).map_err(|source| ConfigError::ResolvePath {
        key: kind.param_name(),
        path: path.to_path_buf(),
        source,
    })
}

fn check_file_created(path: &Path) -> Outcome {
    // Any failure just means "not there yet".
    match access(path, AccessFlags::R_OK) {
        Ok(()) => Outcome::Observed,
        Err(_) => Outcome::Pending,
    }
}

/// A path that is absent counts as deleted even if it never existed.
fn check_file_deleted(path: &Path) -> Outcome {
    match access(path, AccessFlags::R_OK) {
        Ok(()) => Outcome::Pending,
        Err(Errno::ENOENT) | Err(Errno::ENOTDIR) => Outcome::Observed,
        Err(errno) => Outcome::SoftError(EventError::Access {
            path: path.to_path_buf(),
            errno,
        }),
    }
}

fn check_script(command: &str) -> Outcome {
    match run_script(command) {
        Ok(status) if status.code() == Some(0) => Outcome::Pending,
        Ok(status) if status.code() == Some(EVENT_EXIT_CODE) => Outcome::Observed,
        Ok(status) => Outcome::SoftError(EventError::ScriptStatus {
            command: command.to_string(),
            status: describe_exit_status(&status),
        }),
        Err(source) => Outcome::SoftError(EventError::ScriptSpawn {
            command: command.to_string(),
            source,
        }),
    }
}

/// Liveness probe for another process.
///
/// On Linux this holds `/proc/<pid>/stat` open: reads keep succeeding while
/// the watched process exists and fail with `ESRCH` once it is gone, even
/// if the pid is reused. Elsewhere the pid is signalled with signal 0.
#[derive(Debug)]
pub struct ProcessProbe {
    #[cfg(target_os = "linux")]
    stat: File,
    #[cfg(not(target_os = "linux"))]
    pid: u32,
}

impl ProcessProbe {
    #[cfg(target_os = "linux")]
    pub fn open(pid: u32) -> Result<Self, ConfigError> {
        let path = PathBuf::from(format!("/proc/{}/stat", pid));
        let stat = File::open(&path).map_err(|source| ConfigError::OpenProcess { path, source })?;
        Ok(Self { stat })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open(pid: u32) -> Result<Self, ConfigError> {
        Ok(Self { pid })
    }

    #[cfg(target_os = "linux")]
    fn check(&self) -> Outcome {
        use std::io::{Read, Seek, SeekFrom};

        let mut stat = &self.stat;
        let mut byte = [0u8; 1];
        let result = stat.seek(SeekFrom::Start(0)).and_then(|_| stat.read(&mut byte));
        match result {
            Ok(_) => Outcome::Pending,
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Outcome::Observed,
            Err(e) => Outcome::SoftError(EventError::ProcessRead(e)),
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn check(&self) -> Outcome {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(self.pid as i32), None) {
            Ok(()) => Outcome::Pending,
            Err(Errno::ESRCH) => Outcome::Observed,
            // EPERM: the process exists but belongs to someone else.
            Err(Errno::EPERM) => Outcome::Pending,
            Err(errno) => Outcome::SoftError(EventError::ProcessSignal(errno)),
        }
    }
}

/// An inherited descriptor (read side of a pipe or socket) watched for hang-up.
///
/// The descriptor is closed when this is dropped.
#[derive(Debug)]
pub struct WatchedFd {
    fd: RawFd,
}

impl WatchedFd {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    fn check(&self) -> Outcome {
        let mut pollfd = libc::pollfd {
            fd: self.fd,
            events: 0,
            revents: 0,
        };
        // SAFETY: `pollfd` is a valid array of one entry for the duration of
        // the call. poll(2) takes the descriptor by number only and reports
        // POLLNVAL for one that is not open, so no open-descriptor invariant
        // is assumed here.
        let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };

        if ready < 0 {
            return Outcome::SoftError(EventError::Poll(Errno::last()));
        }
        if ready == 0 {
            return Outcome::Pending;
        }
        if pollfd.revents & libc::POLLHUP != 0 {
            Outcome::Observed
        } else if pollfd.revents & libc::POLLNVAL != 0 {
            Outcome::HardError(EventError::InvalidDescriptor(self.fd))
        } else {
            Outcome::Pending
        }
    }
}

impl Drop for WatchedFd {
    fn drop(&mut self) {
        // SAFETY: from configuration onward this value is the descriptor's
        // only owner and nothing else in the process closes it, so it cannot
        // have been reused by another owner. A number that was never open
        // makes close(2) fail with EBADF, which is ignored.
        unsafe {
            libc::close(self.fd);
        }
    }
}
