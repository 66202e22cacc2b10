//! Benchmark results and their JSON persistence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::agents::AgentResult;
use crate::error::Result;

/// Score awarded for a passing run.
pub const PASS_SCORE: u32 = 100;

/// Prefix of suite summary files in the results directory.
pub const SUITE_FILE_PREFIX: &str = "suite_";

const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Result of running one agent against one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Unique identifier for this run.
    #[serde(default = "Uuid::new_v4")]
    pub run_id: Uuid,
    pub task_id: String,
    /// Agent profile name.
    pub agent: String,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    pub success: bool,
    /// 100 on pass, 0 otherwise.
    pub score: u32,
    pub iterations: u32,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    pub duration_secs: f64,
    #[serde(default)]
    pub error: Option<String>,
    /// Exit code and captured streams of the verification command.
    #[serde(default)]
    pub verification_output: Option<String>,
    /// Transcript produced by the agent.
    #[serde(default)]
    pub agent_output: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    fn new(task_id: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_id: task_id.into(),
            agent: agent.into(),
            agent_version: None,
            model_name: None,
            success: false,
            score: 0,
            iterations: 0,
            tokens_used: None,
            duration_secs: 0.0,
            error: None,
            verification_output: None,
            agent_output: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a passing result.
    pub fn success(task_id: impl Into<String>, agent: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            success: true,
            score: PASS_SCORE,
            duration_secs,
            ..Self::new(task_id, agent)
        }
    }

    /// Creates a failing result with an error message.
    pub fn failure(
        task_id: impl Into<String>,
        agent: impl Into<String>,
        duration_secs: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            duration_secs,
            error: Some(error.into()),
            ..Self::new(task_id, agent)
        }
    }

    /// Copies iterations, tokens, version and model from the agent's result.
    pub fn with_agent_result(mut self, agent: &AgentResult) -> Self {
        self.iterations = agent.iterations;
        self.tokens_used = agent.tokens_used;
        self.agent_version = agent.agent_version.clone();
        self.model_name = agent.model_name.clone();
        self
    }

    pub fn with_agent_output(mut self, output: impl Into<String>) -> Self {
        self.agent_output = Some(output.into());
        self
    }

    pub fn with_verification_output(mut self, output: impl Into<String>) -> Self {
        self.verification_output = Some(output.into());
        self
    }

    pub fn status_label(&self) -> &'static str {
        if self.success {
            "pass"
        } else {
            "fail"
        }
    }

    /// `<task>_<agent>_<YYYYmmdd_HHMMSS>_<pass|fail>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.json",
            sanitize(&self.task_id),
            sanitize(&self.agent),
            self.timestamp.format(FILE_TIMESTAMP_FORMAT),
            self.status_label()
        )
    }

    /// Writes the result as pretty JSON into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved result to {}", path.display());
        Ok(path)
    }
}

/// Aggregate over one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResults {
    pub agent: String,
    pub results: Vec<BenchmarkResult>,
    pub total_tasks: usize,
    pub passed: usize,
    pub failed: usize,
    /// Fraction of passing tasks, 0.0 for an empty suite.
    pub pass_rate: f64,
    pub total_duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl SuiteResults {
    pub fn from_results(agent: impl Into<String>, results: Vec<BenchmarkResult>) -> Self {
        let total_tasks = results.len();
        let passed = results.iter().filter(|r| r.success).count();
        let pass_rate = if total_tasks == 0 {
            0.0
        } else {
            passed as f64 / total_tasks as f64
        };
        let total_duration_secs = results.iter().map(|r| r.duration_secs).sum();

        Self {
            agent: agent.into(),
            results,
            total_tasks,
            passed,
            failed: total_tasks - passed,
            pass_rate,
            total_duration_secs,
            timestamp: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}_{}.json",
            SUITE_FILE_PREFIX,
            sanitize(&self.agent),
            self.timestamp.format(FILE_TIMESTAMP_FORMAT)
        )
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input/prompt tokens.
    pub input_tokens: u64,
    /// Output/completion tokens.
    pub output_tokens: u64,
    /// Cached tokens (if applicable).
    pub cached_tokens: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            cached_tokens: 0,
        }
    }

    /// Returns total tokens used, excluding cache reads.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// Keeps file names portable when agent names contain slashes or spaces.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_success_and_failure() {
        let ok = BenchmarkResult::success("fix-1", "claude", 1.5);
        assert!(ok.success);
        assert_eq!(ok.score, 100);
        assert!(ok.error.is_none());

        let failed = BenchmarkResult::failure("fix-1", "claude", 0.2, "Verification tests failed");
        assert!(!failed.success);
        assert_eq!(failed.score, 0);
        assert_eq!(failed.error.as_deref(), Some("Verification tests failed"));
        assert_ne!(ok.run_id, failed.run_id);
    }

    #[test]
    fn test_with_agent_result() {
        let agent = AgentResult::new(true, "done", 3)
            .with_tokens(Some(1500))
            .with_version(Some("1.0.0".into()))
            .with_model(Some("glm-4.6".into()));
        let result = BenchmarkResult::success("t", "a", 1.0).with_agent_result(&agent);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.tokens_used, Some(1500));
        assert_eq!(result.agent_version.as_deref(), Some("1.0.0"));
        assert_eq!(result.model_name.as_deref(), Some("glm-4.6"));
    }

    #[test]
    fn test_file_name() {
        let mut result = BenchmarkResult::failure("fix-1", "my agent/v2", 1.0, "x");
        result.timestamp = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(result.file_name(), "fix-1_my_agent_v2_20250309_140507_fail.json");
    }

    #[test]
    fn test_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let result = BenchmarkResult::success("feat-2", "claude", 2.25)
            .with_agent_output("agent said hi")
            .with_verification_output("Exit code: 0");
        let path = result.save(&dir.path().join("results")).unwrap();

        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_pass.json"));
        let loaded: BenchmarkResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, result.run_id);
        assert_eq!(loaded.agent_output.as_deref(), Some("agent said hi"));
    }

    #[test]
    fn test_suite_aggregates() {
        let results = vec![
            BenchmarkResult::success("a", "claude", 1.0),
            BenchmarkResult::failure("b", "claude", 2.0, "Verification tests failed"),
            BenchmarkResult::success("c", "claude", 3.5),
        ];
        let suite = SuiteResults::from_results("claude", results);
        assert_eq!(suite.total_tasks, 3);
        assert_eq!(suite.passed, 2);
        assert_eq!(suite.failed, 1);
        assert_eq!(suite.passed + suite.failed, suite.total_tasks);
        assert!((suite.pass_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((suite.total_duration_secs - 6.5).abs() < 1e-9);
        assert!(suite.file_name().starts_with("suite_claude_"));
    }

    #[test]
    fn test_empty_suite() {
        let suite = SuiteResults::from_results("claude", Vec::new());
        assert_eq!(suite.total_tasks, 0);
        assert_eq!(suite.pass_rate, 0.0);
    }

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage::new(1000, 500);
        assert_eq!(usage.total(), 1500);
    }
}
