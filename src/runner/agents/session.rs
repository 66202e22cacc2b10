//! Streaming session adapter.
//!
//! Drives Claude Code as a conversational session: the agent is launched with
//! `--output-format stream-json` and every line it prints is decoded into a
//! typed [`SessionEvent`]. The final `result` event carries turn count, token
//! usage and cost.

use std::path::Path;
use std::process::Stdio;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{pin_mut, Stream};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

use super::permissions::allowed_tools;
use super::{query_version, AgentAdapter, AgentConfig, AgentError, AgentResult};
use crate::runner::process::{isolate_process_group, kill_process_group};
use crate::runner::result::TokenUsage;
use crate::task::Task;

/// Model used when neither the profile nor the environment names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Permission mode for unattended benchmark sessions.
pub const SESSION_PERMISSION_MODE: &str = "bypassPermissions";

const MODEL_ENV_KEYS: &[&str] = &["ANTHROPIC_MODEL", "ANTHROPIC_DEFAULT_SONNET_MODEL"];

/// One decoded line of the session's event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    System {
        #[serde(default)]
        subtype: String,
        #[serde(flatten)]
        data: serde_json::Map<String, Value>,
    },
    Assistant {
        message: AssistantMessage,
    },
    /// Tool results echoed back to the model.
    User {
        #[serde(default)]
        message: Value,
    },
    Result(SessionResult),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
    ToolUse { name: String, #[serde(default)] input: Value },
    #[serde(other)]
    Other,
}

/// Final metrics reported by the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionResult {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub usage: Option<SessionUsage>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SessionUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl From<SessionUsage> for TokenUsage {
    fn from(usage: SessionUsage) -> Self {
        TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cached_tokens: usage.cache_read_input_tokens,
        }
    }
}

/// Decodes newline-delimited JSON events. Lines that are not valid events are skipped.
pub fn session_events<R>(reader: R) -> impl Stream<Item = std::io::Result<SessionEvent>>
where
    R: AsyncBufRead + Unpin,
{
    try_stream! {
        let mut lines = LinesStream::new(reader.lines());
        while let Some(line) = lines.next().await {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionEvent>(trimmed) {
                Ok(event) => yield event,
                Err(e) => debug!(error = %e, "Ignoring unparseable stream-json line"),
            }
        }
    }
}

/// Accumulates a transcript and final metrics from session events.
#[derive(Debug, Default)]
pub struct SessionTranscript {
    lines: Vec<String>,
    result: Option<SessionResult>,
}

impl SessionTranscript {
    pub fn record(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Assistant { message } => {
                for block in message.content {
                    match block {
                        ContentBlock::Text { text } => self.lines.push(format!("Assistant: {}", text)),
                        ContentBlock::Thinking { thinking } => {
                            self.lines.push(format!("Thinking: {}", thinking))
                        }
                        ContentBlock::ToolUse { name, input } => {
                            self.lines.push(format!("Tool {}: {}", name, input))
                        }
                        ContentBlock::Other => {}
                    }
                }
            }
            SessionEvent::System { subtype, data } => {
                self.lines
                    .push(format!("System [{}]: {}", subtype, Value::Object(data)));
            }
            SessionEvent::Result(result) => {
                debug!(
                    "Task completed: {} turns, {}ms, ${:.4}",
                    result.num_turns,
                    result.duration_ms,
                    result.total_cost_usd.unwrap_or(0.0)
                );
                self.result = Some(result);
            }
            SessionEvent::User { .. } | SessionEvent::Unknown => {}
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn output(&self) -> String {
        self.lines.join("\n")
    }

    /// Reduces the transcript into an agent result. A session that never
    /// produced a result event is a failure.
    pub fn into_result(self) -> AgentResult {
        let output = self.output();
        match self.result {
            Some(result) => {
                let usage: TokenUsage = result.usage.map(Into::into).unwrap_or_default();
                debug!(
                    "Tokens: {} input, {} output",
                    usage.input_tokens, usage.output_tokens
                );
                let total = usage.total();
                AgentResult::new(!result.is_error, output, result.num_turns)
                    .with_tokens((total > 0).then_some(total))
                    .with_cost(result.total_cost_usd)
            }
            None => AgentResult::new(false, output, 0),
        }
    }
}

/// Adapter that runs Claude Code as a streaming session.
pub struct ClaudeSessionAgent {
    config: AgentConfig,
    version: OnceCell<String>,
}

impl ClaudeSessionAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            version: OnceCell::new(),
        }
    }

    /// Model from the profile, then profile env, then process env, then the default.
    pub fn model_name(&self) -> String {
        if let Some(ref model) = self.config.model {
            return model.clone();
        }
        MODEL_ENV_KEYS
            .iter()
            .find_map(|key| self.config.env.get(*key).cloned())
            .or_else(|| MODEL_ENV_KEYS.iter().find_map(|key| std::env::var(key).ok()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Tools granted for this task.
    pub fn allowed_tools(&self, task: &Task) -> Vec<&'static str> {
        allowed_tools(&task.permissions, self.config.enable_web_search)
    }

    fn system_prompt(workspace: &Path) -> String {
        format!(
            "You are working in the directory: {}\n\
             All relative file paths should be relative to this working directory.\n\
             When instructed to create files with relative paths like 'results/file.txt', \
             create them in the current working directory, not in your home directory.",
            workspace.display()
        )
    }

    fn build_command(
        &self,
        task: &Task,
        workspace: &Path,
        model: &str,
    ) -> Result<Command, AgentError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("-p")
            .arg(&task.prompt)
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--permission-mode")
            .arg(SESSION_PERMISSION_MODE)
            .arg("--max-turns")
            .arg(self.config.max_iterations().to_string())
            .arg("--model")
            .arg(model);

        let tools = self.allowed_tools(task);
        if !tools.is_empty() {
            cmd.arg("--allowedTools").arg(tools.join(","));
        }

        cmd.arg("--append-system-prompt")
            .arg(Self::system_prompt(workspace))
            .current_dir(workspace)
            .envs(self.config.process_env()?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_process_group(&mut cmd);
        Ok(cmd)
    }
}

#[async_trait]
impl AgentAdapter for ClaudeSessionAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(&self, task: &Task, workspace: &Path) -> Result<AgentResult, AgentError> {
        let model = self.model_name();
        let tools = self.allowed_tools(task);

        let preview: String = task.prompt.chars().take(100).collect();
        debug!("Executing task with SDK: {}...", preview);
        debug!("Working directory: {}", workspace.display());
        debug!("Allowed tools: {:?}", tools);
        debug!("Model: {}", model);

        let mut child = self
            .build_command(task, workspace, &model)?
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AgentError::NotFound(self.config.command.clone())
                } else {
                    AgentError::ExecutionFailed(format!("Failed to execute task with SDK: {}", e))
                }
            })?;
        let pid = child.id();

        let stdout = child.stdout.take().ok_or_else(|| {
            AgentError::ExecutionFailed("Session stdout was not captured".to_string())
        })?;
        let stderr_pipe = child.stderr.take();
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr_pipe {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let mut transcript = SessionTranscript::default();
        let session = tokio::time::timeout(self.config.timeout(), async {
            let events = session_events(BufReader::new(stdout));
            pin_mut!(events);
            while let Some(event) = events.next().await {
                transcript.record(event?);
            }
            let status = child.wait().await?;
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stderr))
        })
        .await;

        let (status, stderr) = match session {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => {
                error!("SDK execution failed: {}", e);
                kill_process_group(pid);
                stderr_task.abort();
                return Err(AgentError::ExecutionFailed(format!(
                    "Failed to execute task with SDK: {}",
                    e
                )));
            }
            Err(_) => {
                warn!(timeout_secs = self.config.timeout_secs, "Session timed out; killing");
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Session already exited");
                }
                stderr_task.abort();
                return Err(AgentError::Timeout(self.config.timeout()));
            }
        };

        if !status.success() {
            debug!("Session exit status: {:?}", status.code());
            if !stderr.trim().is_empty() {
                transcript.push_line(format!("STDERR:\n{}", stderr.trim_end()));
            }
        }

        Ok(transcript
            .into_result()
            .with_version(self.version().await)
            .with_model(Some(model)))
    }

    async fn version(&self) -> Option<String> {
        let version = self
            .version
            .get_or_init(|| async {
                match query_version(&self.config.command).await {
                    Some(v) => format!("claude-agent-sdk {}", v),
                    None => {
                        warn!("Failed to get SDK version");
                        "claude-agent-sdk (unknown version)".to_string()
                    }
                }
            })
            .await;
        Some(version.clone())
    }
}
