//! Privileged and unprivileged command execution.
//!
//! All routing state is manipulated by shelling out to `ip`; read-only
//! queries (rule listings, property lookups) run unprivileged. Commands are
//! executed once, never retried.

use std::io;
use std::process::Command;

use tracing::debug;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Stdout split into lines.
    pub lines: Vec<String>,
}

/// Executes command lines on behalf of the routing core.
///
/// `run_privileged` backs every mutating `ip` invocation and must carry
/// elevated privilege; `run` covers read-only queries.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command_line: &str) -> io::Result<CommandOutput>;
    fn run_privileged(&self, command_line: &str) -> io::Result<CommandOutput>;
}

/// Runner backed by `std::process::Command`.
///
/// With an escalation prefix (e.g. `sudo -n`) privileged command lines are
/// wrapped in it; without one the process is assumed to already hold the
/// needed privilege.
pub struct SystemRunner {
    escalate: Option<String>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self { escalate: None }
    }

    pub fn with_escalation(prefix: impl Into<String>) -> Self {
        Self {
            escalate: Some(prefix.into()),
        }
    }

    fn spawn(&self, command_line: &str) -> io::Result<CommandOutput> {
        let argv: Vec<&str> = command_line.split_whitespace().collect();
        let (program, args) = argv.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
        })?;

        let output = Command::new(program).args(args).output()?;
        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();

        debug!(
            command = %command_line,
            success = output.status.success(),
            "command finished"
        );

        Ok(CommandOutput {
            success: output.status.success(),
            lines,
        })
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command_line: &str) -> io::Result<CommandOutput> {
        self.spawn(command_line)
    }

    fn run_privileged(&self, command_line: &str) -> io::Result<CommandOutput> {
        match &self.escalate {
            Some(prefix) => self.spawn(&format!("{prefix} {command_line}")),
            None => self.spawn(command_line),
        }
    }
}

/// Check if running with elevated privileges.
#[cfg(unix)]
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}
