//! Verification of an agent's work by running the task's shell command.
//!
//! The command is tokenized with POSIX shell quoting rules and executed
//! directly (no shell) inside the workspace.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use super::process::{run_with_timeout, ProcessError};
use crate::error::{BenchError, Result};
use crate::task::Task;

/// Outcome of a verification command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True iff the command exited with status 0.
    pub passed: bool,
    /// Exit code, absent if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_secs: f64,
}

impl VerificationResult {
    /// Human-readable report attached to persisted results.
    pub fn report(&self) -> String {
        let code = match self.exit_code {
            Some(code) => code.to_string(),
            None => "none (terminated by signal)".to_string(),
        };
        format!(
            "Exit code: {}\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            code, self.stdout, self.stderr
        )
    }
}

/// Splits a verification command into program and arguments.
pub fn parse_command(command: &str) -> Result<Vec<String>> {
    let parts = shell_words::split(command).map_err(|e| {
        BenchError::Verification(format!("Invalid verification command '{}': {}", command, e))
    })?;
    if parts.is_empty() {
        return Err(BenchError::Verification(
            "Empty verification command".to_string(),
        ));
    }
    Ok(parts)
}

/// Runs verification commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Runs `task.verification.command` in `workspace` under the task's timeout.
    pub async fn verify(&self, task: &Task, workspace: &Path) -> Result<VerificationResult> {
        let parts = parse_command(&task.verification.command)?;
        let timeout = Duration::from_secs(task.verification.timeout);

        info!(
            "Running verification for {}: {}",
            task.id, task.verification.command
        );

        let mut cmd = Command::new(&parts[0]);
        cmd.args(&parts[1..]).current_dir(workspace);

        let output = run_with_timeout(cmd, timeout).await.map_err(|e| match e {
            ProcessError::Timeout(d) => BenchError::Verification(format!(
                "Verification command timed out after {} seconds",
                d.as_secs()
            )),
            other => BenchError::Verification(format!(
                "Failed to execute verification command: {}",
                other
            )),
        })?;

        let result = VerificationResult {
            passed: output.exit_code() == Some(0),
            exit_code: output.exit_code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_secs: output.duration.as_secs_f64(),
        };

        debug!(
            "Verification exit code: {:?} ({:.2}s)",
            result.exit_code, result.duration_secs
        );
        Ok(result)
    }
}
