//! Configuration for benchmark runs and agent profiles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::agents::{AgentConfig, AgentType};

/// Default directory scanned for task files.
pub const DEFAULT_TASKS_DIR: &str = "tasks";
/// Default directory result files are written to.
pub const DEFAULT_RESULTS_DIR: &str = "results";
/// Default root for per-task workspaces.
pub const DEFAULT_WORKSPACE_DIR: &str = "/tmp/agent-bench";

/// Directories and overrides used by the task runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory containing task YAML files (searched recursively).
    pub tasks_dir: PathBuf,
    /// Directory where result JSON files are written.
    pub results_dir: PathBuf,
    /// Root directory for task workspaces.
    pub workspace_dir: PathBuf,
    /// Overrides the agent profile's iteration cap when set.
    pub max_iterations: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tasks_dir: PathBuf::from(DEFAULT_TASKS_DIR),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            workspace_dir: PathBuf::from(DEFAULT_WORKSPACE_DIR),
            max_iterations: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tasks_dir = dir.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u32>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Applies the iteration override to an agent profile.
    pub fn apply_to(&self, agent: &AgentConfig) -> AgentConfig {
        match self.max_iterations {
            Some(n) => agent.clone().with_max_iterations(n),
            None => agent.clone(),
        }
    }
}

/// Errors raised while loading agent profiles.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

/// Named agent profiles, e.g. one Claude CLI profile per model endpoint.
///
/// ```yaml
/// claude-glm:
///   type: claude
///   base_url: https://open.bigmodel.cn/api/anthropic
///   auth_token_env: GLM_API_KEY
///   model: glm-4.6
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentProfiles {
    profiles: BTreeMap<String, AgentConfig>,
}

impl AgentProfiles {
    /// Loads profiles from a YAML map of name to configuration. Profiles
    /// without an explicit `name` take the map key.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let profiles = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "Loaded {} agent profile(s) from {}",
            profiles.len(),
            path.display()
        );
        Ok(profiles)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let raw: BTreeMap<String, AgentConfig> = serde_yaml::from_str(content)?;
        let profiles = raw
            .into_iter()
            .map(|(key, mut config)| {
                if config.name.is_empty() {
                    config.name = key.clone();
                }
                (key, config)
            })
            .collect();
        Ok(Self { profiles })
    }

    pub fn insert(&mut self, config: AgentConfig) {
        self.profiles.insert(config.name.clone(), config);
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Looks up a named profile, falling back to the built-in agent types.
    pub fn resolve(&self, name: &str) -> Result<AgentConfig, ConfigError> {
        if let Some(config) = self.get(name) {
            return Ok(config.clone());
        }
        name.parse::<AgentType>()
            .map(|agent_type| AgentConfig::new(agent_type).with_name(name))
            .map_err(|_| ConfigError::UnknownAgent(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_config_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.tasks_dir, PathBuf::from("tasks"));
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert_eq!(config.workspace_dir, PathBuf::from("/tmp/agent-bench"));
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn test_max_iterations_override() {
        let config = RunnerConfig::new().with_max_iterations(Some(7));
        let agent = config.apply_to(&AgentConfig::claude());
        assert_eq!(agent.max_iterations(), 7);

        let untouched = RunnerConfig::new().apply_to(&AgentConfig::claude_sdk());
        assert_eq!(untouched.max_iterations(), 20);
    }

    #[test]
    fn test_profiles_from_yaml() {
        let profiles = AgentProfiles::from_yaml(
            "claude-glm:\n  type: claude\n  model: glm-4.6\n  auth_token_env: GLM_API_KEY\n\
             sdk-fast:\n  type: claude-sdk\n  name: sdk-fast-renamed\n  max_iterations: 5\n",
        )
        .unwrap();

        assert_eq!(profiles.len(), 2);
        let glm = profiles.resolve("claude-glm").unwrap();
        assert_eq!(glm.name, "claude-glm");
        assert_eq!(glm.model.as_deref(), Some("glm-4.6"));

        let sdk = profiles.resolve("sdk-fast").unwrap();
        assert_eq!(sdk.name, "sdk-fast-renamed");
        assert_eq!(sdk.max_iterations(), 5);
    }

    #[test]
    fn test_resolve_builtin_and_unknown() {
        let profiles = AgentProfiles::default();
        let claude = profiles.resolve("claude").unwrap();
        assert_eq!(claude.agent_type, AgentType::Claude);
        assert_eq!(claude.name, "claude");

        let err = profiles.resolve("aider").unwrap_err();
        assert_eq!(err.to_string(), "Unknown agent: aider");
    }

    #[test]
    fn test_from_file_missing() {
        let err = AgentProfiles::from_file(Path::new("/nonexistent/agents.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
