// OutageSnap - platform/command.rs
//
// External command execution for the metrics stage.

use std::io;
use std::process::Command;

/// Captured outcome of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// Never fails: a missing binary or spawn error is reported as an
/// unsuccessful output whose stderr explains the problem.
pub fn run_command(program: &str, args: &[&str]) -> CommandOutput {
    tracing::debug!(program, args = ?args, "Running external command");

    match Command::new(program).args(args).output() {
        Ok(output) => CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: format!("Command '{program}' not found."),
        },
        Err(e) => CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: format!("Failed to run '{program}': {e}"),
        },
    }
}
