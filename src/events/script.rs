//! Script-driven events.
//!
//! A configured command is run through `/bin/sh -c` on every check. Its exit
//! status is the only signal: [`EVENT_EXIT_CODE`] means the event happened,
//! zero means it has not, anything else is reported and ignored.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

use nix::sys::signal::Signal;

/// Exit code a script uses to report that its event has happened.
pub const EVENT_EXIT_CODE: i32 = 88;

const SHELL: &str = "/bin/sh";

/// Run `command` through the shell and wait for it.
pub fn run_script(command: &str) -> io::Result<ExitStatus> {
    Command::new(SHELL).arg("-c").arg(command).status()
}

/// Translate an abnormal exit status into a message suitable for the log.
pub fn describe_exit_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("command exited with error status {}", code);
    }
    if let Some(signo) = status.signal() {
        return format!("command was killed by signal {}", signal_name(signo));
    }
    if let Some(signo) = status.stopped_signal() {
        return format!("command was stopped by signal {}", signal_name(signo));
    }
    format!("command ended abnormally ({})", status)
}

fn signal_name(signo: i32) -> String {
    match Signal::try_from(signo) {
        Ok(signal) => signal.as_str().to_string(),
        Err(_) => signo.to_string(),
    }
}
