//! Subprocess execution with a wall-clock deadline.
//!
//! Every child is spawned with `kill_on_drop` and, when the deadline expires,
//! killed and reaped explicitly before the timeout is reported.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout followed by a `STDERR:` section when stderr is non-empty.
    pub fn combined(&self) -> String {
        combine_streams(&self.stdout, &self.stderr)
    }
}

/// Joins the two captured streams into one transcript.
pub fn combine_streams(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{}\n\nSTDERR:\n{}", stdout, stderr)
    }
}

/// Error type for process execution.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

impl ProcessError {
    /// True if spawning failed because the program does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProcessError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Puts the child in its own process group so a timeout can take down any
/// background processes it started along with it.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Sends SIGKILL to the process group led by `pid`.
pub fn kill_process_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) {
            // SAFETY: kill(2) has no memory-safety preconditions.
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc != 0 {
                debug!(pgid, error = %std::io::Error::last_os_error(), "Process group already gone");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Runs `cmd` to completion, capturing both streams, within `timeout`.
///
/// Stdin is closed. Stdout and stderr are drained concurrently so a chatty
/// child cannot block on a full pipe. The deadline covers both the exit of the
/// child and the end of its output, which stays open while any background
/// process holds the pipes.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().to_string();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate_process_group(&mut cmd);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let pid = child.id();

    let mut stdout_task = tokio::spawn(read_to_end(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_to_end(child.stderr.take()));

    let finished = tokio::time::timeout(timeout, async {
        tokio::join!(child.wait(), &mut stdout_task, &mut stderr_task)
    })
    .await;

    let (status, stdout, stderr) = match finished {
        Ok((Ok(status), stdout, stderr)) => (
            status,
            stdout.unwrap_or_default(),
            stderr.unwrap_or_default(),
        ),
        Ok((Err(source), _, _)) => {
            kill_process_group(pid);
            return Err(ProcessError::Wait { program, source });
        }
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout.as_secs(), "Process timed out; killing");
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                debug!(program = %program, error = %e, "Child already exited before kill");
            }
            stdout_task.abort();
            stderr_task.abort();
            return Err(ProcessError::Timeout(timeout));
        }
    };
    let duration = start.elapsed();

    debug!(
        program = %program,
        exit_code = ?status.code(),
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "Process finished in {:?}",
        duration
    );

    Ok(ProcessOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        duration,
    })
}

async fn read_to_end<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            warn!(error = %e, "Error reading process output");
        }
    }
    buf
}
