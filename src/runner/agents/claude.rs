//! Claude Code CLI adapter.
//!
//! Runs `claude -p <prompt>` inside the workspace. With an iteration cap of one
//! the agent is invoked once; with a higher cap the session is resumed with
//! `--continue` until the agent reports completion or the cap is exhausted.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::permissions::{cli_flags, describe_flags};
use super::{query_version, AgentAdapter, AgentConfig, AgentError, AgentResult};
use crate::runner::process::run_with_timeout;
use crate::task::Task;

/// Literal the agent must print for a multi-turn run to count as finished.
pub const COMPLETION_MARKER: &str = "DONE";

/// Prompt sent on every iteration after the first.
pub const CONTINUATION_PROMPT: &str = "Please continue with the task. Check if verification passes. If there are errors, fix them and retry.";

/// Adapter that shells out to the Claude Code CLI.
pub struct ClaudeCliAgent {
    config: AgentConfig,
    version: OnceCell<Option<String>>,
}

impl ClaudeCliAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            version: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Builds one invocation of the CLI.
    fn build_command(
        &self,
        task: &Task,
        workspace: &Path,
        prompt: &str,
        resume: bool,
    ) -> Result<Command, AgentError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(cli_flags(&task.permissions));
        if resume {
            cmd.arg("--continue");
        }
        if let Some(ref model) = self.config.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg("-p").arg(prompt);
        cmd.current_dir(workspace);
        cmd.envs(self.config.process_env()?);
        Ok(cmd)
    }

    fn command_line(&self, task: &Task, resume: bool) -> String {
        let flags = describe_flags(&cli_flags(&task.permissions));
        let mut line = self.config.command.clone();
        if !flags.is_empty() {
            line.push(' ');
            line.push_str(&flags);
        }
        if resume {
            line.push_str(" --continue");
        }
        line.push_str(" -p <prompt>");
        line
    }

    async fn run_once(&self, task: &Task, workspace: &Path) -> Result<AgentResult, AgentError> {
        debug!("Executing: {}", self.command_line(task, false));
        debug!("Working directory: {}", workspace.display());

        let cmd = self.build_command(task, workspace, &task.prompt, false)?;
        let output = run_with_timeout(cmd, self.config.timeout())
            .await
            .map_err(|e| AgentError::from_process(e, "Failed to execute claude CLI"))?;

        let exit_code = output.exit_code().ok_or_else(|| {
            AgentError::ExecutionFailed(
                "Failed to execute claude CLI: process terminated by signal".to_string(),
            )
        })?;

        debug!("Command exit status: {}", exit_code);
        if !output.stdout.is_empty() {
            debug!("STDOUT:\n{}", output.stdout);
        }
        if !output.stderr.is_empty() {
            debug!("STDERR:\n{}", output.stderr);
        }

        Ok(AgentResult::new(exit_code == 0, output.combined(), 1))
    }

    async fn run_iterations(
        &self,
        task: &Task,
        workspace: &Path,
        max_iterations: u32,
    ) -> Result<AgentResult, AgentError> {
        let mut last_output = String::new();

        for iteration in 1..=max_iterations {
            let resume = iteration > 1;
            let prompt = if resume {
                CONTINUATION_PROMPT
            } else {
                task.prompt.as_str()
            };

            debug!(
                "Executing (iteration {}): {}",
                iteration,
                self.command_line(task, resume)
            );
            debug!("Prompt length (iteration {}): {} bytes", iteration, prompt.len());

            let cmd = self.build_command(task, workspace, prompt, resume)?;
            let output = run_with_timeout(cmd, self.config.timeout())
                .await
                .map_err(|e| {
                    AgentError::from_process(
                        e,
                        &format!("Failed to execute claude CLI (iteration {})", iteration),
                    )
                })?;

            last_output = output.combined();
            if output.exit_code().is_none() {
                last_output.push_str("\n\n[process terminated by signal]");
            }

            debug!(
                "Command exit status (iteration {}): {:?}",
                iteration,
                output.exit_code()
            );

            if output.success() && last_output.contains(COMPLETION_MARKER) {
                info!("Agent reported completion after {} iteration(s)", iteration);
                return Ok(AgentResult::new(true, last_output, iteration));
            }

            if iteration < max_iterations {
                tokio::time::sleep(self.config.iteration_delay()).await;
            }
        }

        info!(
            "Agent did not report completion within {} iterations",
            max_iterations
        );
        Ok(AgentResult::new(false, last_output, max_iterations))
    }
}

#[async_trait]
impl AgentAdapter for ClaudeCliAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, task: &Task, workspace: &Path) -> Result<AgentResult, AgentError> {
        let max_iterations = self.config.max_iterations();
        let result = if max_iterations == 1 {
            self.run_once(task, workspace).await?
        } else {
            self.run_iterations(task, workspace, max_iterations).await?
        };

        Ok(result
            .with_version(self.version().await)
            .with_model(self.config.model.clone()))
    }

    async fn version(&self) -> Option<String> {
        self.version
            .get_or_init(|| query_version(&self.config.command))
            .await
            .clone()
    }
}
