//! Agent adapters for different AI coding agent backends.
//!
//! Each adapter knows how to:
//! 1. Translate a task's permissions into the agent's tool allowlist
//! 2. Launch the agent inside the task workspace
//! 3. Reduce whatever the agent produced into a uniform [`AgentResult`]

pub mod claude;
pub mod permissions;
pub mod session;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::process::{run_with_timeout, ProcessError};
use crate::task::Task;

pub use claude::ClaudeCliAgent;
pub use session::{ClaudeSessionAgent, SessionEvent};

/// Default wall-clock timeout for a single agent invocation.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;

/// Default pause between multi-turn iterations.
pub const DEFAULT_ITERATION_DELAY_MS: u64 = 2000;

/// Default turn cap for the session backend.
pub const DEFAULT_SESSION_MAX_TURNS: u32 = 20;

/// Supported agent backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    /// Claude Code invoked directly as a CLI (`-p` mode).
    Claude,
    /// Claude Code driven as a streaming session (SDK-style event stream).
    ClaudeSdk,
}

impl AgentType {
    /// Returns the default profile name for this agent type.
    pub fn default_name(&self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::ClaudeSdk => "claude-sdk",
        }
    }

    /// Returns the default iteration cap for this agent type.
    pub fn default_max_iterations(&self) -> u32 {
        match self {
            AgentType::Claude => 1,
            AgentType::ClaudeSdk => DEFAULT_SESSION_MAX_TURNS,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_name())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claude-cli" => Ok(AgentType::Claude),
            "claude-sdk" | "claude_sdk" | "sdk" => Ok(AgentType::ClaudeSdk),
            other => Err(format!("Unknown agent type: {}", other)),
        }
    }
}

/// Configuration record for one agent profile.
///
/// Profiles differ in backend, endpoint, model and credentials; the adapter
/// implementation is chosen by `agent_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name recorded in results.
    #[serde(default)]
    pub name: String,
    /// Backend used to run the agent.
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    /// Executable to launch.
    #[serde(default = "default_command")]
    pub command: String,
    /// Model identifier (if the backend should not pick its own).
    #[serde(default)]
    pub model: Option<String>,
    /// API endpoint override, exported as `ANTHROPIC_BASE_URL`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the auth token.
    #[serde(default)]
    pub auth_token_env: Option<String>,
    /// Iteration cap (multi-turn CLI) or turn cap (session).
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Timeout per agent invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between multi-turn iterations, in milliseconds.
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    /// Grant web tools regardless of task permissions (session backend).
    #[serde(default)]
    pub enable_web_search: bool,
    /// Extra environment variables for the agent process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

fn default_iteration_delay_ms() -> u64 {
    DEFAULT_ITERATION_DELAY_MS
}

impl AgentConfig {
    /// Creates a configuration for the given backend with defaults.
    pub fn new(agent_type: AgentType) -> Self {
        Self {
            name: agent_type.default_name().to_string(),
            agent_type,
            command: default_command(),
            model: None,
            base_url: None,
            auth_token_env: None,
            max_iterations: None,
            timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
            iteration_delay_ms: DEFAULT_ITERATION_DELAY_MS,
            enable_web_search: false,
            env: BTreeMap::new(),
        }
    }

    /// The `claude` CLI profile.
    pub fn claude() -> Self {
        Self::new(AgentType::Claude)
    }

    /// The `claude-sdk` session profile.
    pub fn claude_sdk() -> Self {
        Self::new(AgentType::ClaudeSdk)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_auth_token_env(mut self, key: impl Into<String>) -> Self {
        self.auth_token_env = Some(key.into());
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Effective iteration cap, never below one.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
            .unwrap_or_else(|| self.agent_type.default_max_iterations())
            .max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }

    /// Environment passed to the agent process: extra vars, endpoint and token.
    ///
    /// A profile that names an auth token variable requires it to be set.
    pub fn process_env(&self) -> Result<Vec<(String, String)>, AgentError> {
        let mut vars: Vec<(String, String)> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(ref url) = self.base_url {
            vars.push(("ANTHROPIC_BASE_URL".to_string(), url.clone()));
        }

        if let Some(ref key) = self.auth_token_env {
            let token = std::env::var(key).map_err(|_| {
                AgentError::Config(format!(
                    "Auth token environment variable {} is not set (profile {})",
                    key, self.name
                ))
            })?;
            vars.push(("ANTHROPIC_AUTH_TOKEN".to_string(), token));
        }

        Ok(vars)
    }
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub success: bool,
    /// Free-text transcript of what the agent printed.
    pub output: String,
    pub iterations: u32,
    pub tokens_used: Option<u64>,
    pub agent_version: Option<String>,
    pub model_name: Option<String>,
    pub cost_usd: Option<f64>,
}

impl AgentResult {
    pub fn new(success: bool, output: impl Into<String>, iterations: u32) -> Self {
        Self {
            success,
            output: output.into(),
            iterations,
            tokens_used: None,
            agent_version: None,
            model_name: None,
            cost_usd: None,
        }
    }

    pub fn with_tokens(mut self, tokens: Option<u64>) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.agent_version = version;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model_name = model;
        self
    }

    pub fn with_cost(mut self, cost_usd: Option<f64>) -> Self {
        self.cost_usd = cost_usd;
        self
    }
}

/// Trait for agent adapters.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Name recorded in results.
    fn name(&self) -> &str;

    /// Executes `task` inside `workspace`.
    async fn execute(&self, task: &Task, workspace: &Path) -> Result<AgentResult, AgentError>;

    /// Returns the version of the agent (if available).
    async fn version(&self) -> Option<String> {
        None
    }
}

/// Error type for agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent command not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Agent timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Agent configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Maps a process failure, prefixing non-timeout failures with `context`.
    pub(crate) fn from_process(err: ProcessError, context: &str) -> Self {
        match err {
            ProcessError::Timeout(d) => AgentError::Timeout(d),
            ProcessError::Spawn { ref program, .. } if err.is_not_found() => {
                AgentError::NotFound(program.clone())
            }
            other => AgentError::ExecutionFailed(format!("{}: {}", context, other)),
        }
    }
}

/// Creates the adapter for a configuration.
pub fn create_adapter(config: &AgentConfig) -> Box<dyn AgentAdapter> {
    match config.agent_type {
        AgentType::Claude => Box::new(ClaudeCliAgent::new(config.clone())),
        AgentType::ClaudeSdk => Box::new(ClaudeSessionAgent::new(config.clone())),
    }
}

/// Runs `<command> --version` and returns the first trimmed line.
pub(crate) async fn query_version(command: &str) -> Option<String> {
    let mut cmd = Command::new(command);
    cmd.arg("--version");
    let output = run_with_timeout(cmd, Duration::from_secs(10)).await.ok()?;
    if !output.success() {
        return None;
    }
    output
        .stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
}
