//! Time-bounded execution of the OS neighbor-cache inspection commands.

use crossbeam::channel;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A program plus its fixed argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl Invocation {
    pub const fn new(program: &'static str, args: &'static [&'static str]) -> Self {
        Invocation { program, args }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs an inspection command and hands back whatever it printed.
pub trait CommandRunner {
    /// Captured standard output. Any failure degrades to an empty string.
    fn run(&self, invocation: &Invocation) -> String;
}

#[derive(Error, Debug)]
enum CommandFailure {
    #[error("could not start: {0}")]
    Spawn(io::Error),
    #[error("no stdout handle")]
    NoStdout,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("wait failed: {0}")]
    Wait(io::Error),
    #[error("exited with {0}")]
    Status(ExitStatus),
}

/// Spawns real processes, killing any that outlive the timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        SystemCommandRunner { timeout }
    }

    fn run_bounded(&self, invocation: &Invocation) -> Result<String, CommandFailure> {
        let mut child = Command::new(invocation.program)
            .args(invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(CommandFailure::Spawn)?;

        // Drain stdout on a helper thread so a chatty child never blocks on a full pipe.
        let mut stdout = child.stdout.take().ok_or(CommandFailure::NoStdout)?;
        let (output_sender, output_receiver) = channel::bounded(1);
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stdout.read_to_end(&mut buffer);
            let _ = output_sender.send(buffer);
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandFailure::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(CommandFailure::Wait(e));
                }
            }
        };

        if !status.success() {
            return Err(CommandFailure::Status(status));
        }

        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(POLL_INTERVAL);
        let bytes = output_receiver
            .recv_timeout(remaining)
            .map_err(|_| CommandFailure::Timeout(self.timeout))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        SystemCommandRunner::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> String {
        match self.run_bounded(invocation) {
            Ok(output) => {
                debug!(command = %invocation, bytes = output.len(), "command finished");
                output
            }
            Err(failure) => {
                warn!(command = %invocation, "neighbor command unavailable: {}", failure);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_yields_empty_output() {
        let runner = SystemCommandRunner::default();
        let output = runner.run(&Invocation::new("definitely-not-a-real-binary-4f2a", &[]));
        assert!(output.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn captures_standard_output() {
        let runner = SystemCommandRunner::default();
        let output = runner.run(&Invocation::new(
            "sh",
            &["-c", "echo 10.0.0.1 lladdr aa:bb:cc:dd:ee:ff"],
        ));
        assert_eq!(output.trim(), "10.0.0.1 lladdr aa:bb:cc:dd:ee:ff");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_yields_empty_output() {
        let runner = SystemCommandRunner::default();
        let output = runner.run(&Invocation::new("sh", &["-c", "echo partial; exit 3"]));
        assert!(output.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_is_killed_at_the_deadline() {
        let runner = SystemCommandRunner::new(Duration::from_millis(200));
        let started = Instant::now();
        let output = runner.run(&Invocation::new("sleep", &["5"]));
        assert!(output.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn invocation_display_joins_arguments() {
        assert_eq!(Invocation::new("arp", &["-n"]).to_string(), "arp -n");
    }
}
