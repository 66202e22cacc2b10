//! Benchmark task definitions.
//!
//! A task is a YAML document describing where the code comes from, what the
//! agent is asked to do, which tools it may use and how the result is checked:
//!
//! ```yaml
//! id: fix-off-by-one
//! title: Fix off-by-one in pagination
//! category: bug-fix
//! difficulty: easy
//! source:
//!   repository: https://github.com/example/pager.git
//!   commit: 3f2c1ab
//! prompt: |
//!   The last page of results is never returned. Fix it.
//! verification:
//!   type: command
//!   command: cargo test --quiet
//!   timeout: 120
//! permissions:
//!   write: true
//!   bash: true
//! metadata:
//!   tags: [rust, pagination]
//! ```

mod loader;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

pub use loader::TaskLoader;

/// Repository value meaning "no source checkout, start from an empty directory".
pub const NO_REPOSITORY: &str = "none";

/// Default verification timeout in seconds.
pub const DEFAULT_VERIFICATION_TIMEOUT_SECS: u64 = 60;

/// Task category classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    BugFix,
    Feature,
    Refactor,
    Tools,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::BugFix => "bug-fix",
            TaskCategory::Feature => "feature",
            TaskCategory::Refactor => "refactor",
            TaskCategory::Tools => "tools",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the task's code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Git URL, or `none` for an empty workspace.
    pub repository: String,
    /// Commit hash or branch to check out.
    pub commit: String,
}

/// How the agent's work is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Verification kind (currently informational, e.g. `command`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Shell-style command line run inside the workspace.
    pub command: String,
    /// Timeout in seconds.
    #[serde(default = "default_verification_timeout")]
    pub timeout: u64,
}

fn default_verification_timeout() -> u64 {
    DEFAULT_VERIFICATION_TIMEOUT_SECS
}

/// Tools the agent is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Explicit permission mode passed through to the agent.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub write: bool,
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default)]
    pub bash: bool,
    #[serde(default)]
    pub web_fetch: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            mode: None,
            write: false,
            read: true,
            bash: false,
            web_fetch: false,
        }
    }
}

impl PermissionsConfig {
    /// Returns true if any permission beyond reading is granted.
    pub fn is_elevated(&self) -> bool {
        self.write || self.bash || self.web_fetch
    }
}

/// Free-form task metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Any other keys found under `metadata`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A benchmark task definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub category: TaskCategory,
    pub difficulty: Difficulty,
    pub source: SourceConfig,
    pub prompt: String,
    pub verification: VerificationConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl Task {
    /// Loads and validates a task from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::TaskLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            BenchError::TaskLoad(msg) => {
                BenchError::TaskLoad(format!("Failed to load {}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parses and validates a task from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let task: Task = serde_yaml::from_str(content)
            .map_err(|e| BenchError::TaskLoad(format!("Failed to parse task YAML: {}", e)))?;
        task.validate()?;
        Ok(task)
    }

    /// Checks the fields serde cannot express as types.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("Task ID", &self.id),
            ("Task title", &self.title),
            ("Task prompt", &self.prompt),
            ("Source repository", &self.source.repository),
            ("Source commit", &self.source.commit),
            ("Verification command", &self.verification.command),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BenchError::InvalidTaskFormat(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }

        if !is_valid_task_id(&self.id) {
            return Err(BenchError::InvalidTaskFormat(format!(
                "Task ID '{}' must contain only letters, digits, '.', '_' or '-'",
                self.id
            )));
        }

        if self.verification.timeout == 0 {
            return Err(BenchError::InvalidTaskFormat(
                "Verification timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns true if the task starts from a cloned repository.
    pub fn has_repository(&self) -> bool {
        let repo = self.source.repository.trim();
        !repo.is_empty() && repo != NO_REPOSITORY
    }
}

/// Task ids name workspace directories and result files, so they must be a
/// single plain path component.
pub fn is_valid_task_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_YAML: &str = r#"
id: fix-1
title: Fix the thing
category: bug-fix
difficulty: medium
source:
  repository: none
  commit: HEAD
prompt: Make the tests pass.
verification:
  type: command
  command: "true"
metadata:
  tags: [demo]
  owner: bench-team
"#;

    #[test]
    fn test_parse_task_with_defaults() {
        let task = Task::from_yaml(TASK_YAML).unwrap();
        assert_eq!(task.id, "fix-1");
        assert_eq!(task.category, TaskCategory::BugFix);
        assert_eq!(task.difficulty, Difficulty::Medium);
        assert_eq!(task.verification.timeout, DEFAULT_VERIFICATION_TIMEOUT_SECS);
        assert_eq!(task.permissions, PermissionsConfig::default());
        assert!(task.permissions.read);
        assert!(!task.permissions.is_elevated());
        assert_eq!(task.metadata.tags, vec!["demo".to_string()]);
        assert_eq!(
            task.metadata.extra.get("owner"),
            Some(&serde_json::Value::String("bench-team".into()))
        );
        assert!(!task.has_repository());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let yaml = TASK_YAML.replace("bug-fix", "docs");
        let err = Task::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BenchError::TaskLoad(_)));
    }

    #[test]
    fn test_empty_verification_command_is_rejected() {
        let yaml = TASK_YAML.replace("command: \"true\"", "command: \"  \"");
        let err = Task::from_yaml(&yaml).unwrap_err();
        match err {
            BenchError::InvalidTaskFormat(msg) => {
                assert_eq!(msg, "Verification command cannot be empty")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_path_like_ids_are_rejected() {
        for id in ["..", ".", "a/b", "/abs", "x y"] {
            let yaml = TASK_YAML.replace("id: fix-1", &format!("id: {:?}", id));
            match Task::from_yaml(&yaml) {
                Err(BenchError::InvalidTaskFormat(msg)) => {
                    assert!(msg.starts_with(&format!("Task ID '{}'", id)), "{msg}")
                }
                other => panic!("id {id:?} accepted: {other:?}"),
            }
        }
        assert!(is_valid_task_id("v1.2_fix-3"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let yaml = TASK_YAML.replace("command: \"true\"", "command: \"true\"\n  timeout: 0");
        assert!(matches!(
            Task::from_yaml(&yaml),
            Err(BenchError::InvalidTaskFormat(_))
        ));
    }

    #[test]
    fn test_has_repository() {
        let mut task = Task::from_yaml(TASK_YAML).unwrap();
        task.source.repository = "https://github.com/example/repo.git".into();
        assert!(task.has_repository());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(TaskCategory::BugFix.to_string(), "bug-fix");
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }
}
