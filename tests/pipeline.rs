//! Integration tests for the benchmark pipeline.
//!
//! Most tests drive the runner with a stub agent so no real agent is needed.
//! Tests against the real Claude CLI are ignored by default.
//! Run with: cargo test --test pipeline -- --ignored

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use agent_bench::runner::{
    AgentAdapter, AgentConfig, AgentError, AgentResult, BenchmarkResult, RunnerConfig, TaskRunner,
};
use agent_bench::task::Task;
use async_trait::async_trait;
use tempfile::TempDir;

/// Agent that optionally writes a file into the workspace and reports a fixed outcome.
struct StubAgent {
    name: String,
    write_file: Option<(&'static str, &'static str)>,
    fail_with: Option<&'static str>,
    calls: AtomicU32,
}

impl StubAgent {
    fn new() -> Self {
        Self {
            name: "stub".to_string(),
            write_file: None,
            fail_with: None,
            calls: AtomicU32::new(0),
        }
    }

    fn writing(mut self, file: &'static str, content: &'static str) -> Self {
        self.write_file = Some((file, content));
        self
    }

    fn failing(mut self, message: &'static str) -> Self {
        self.fail_with = Some(message);
        self
    }
}

#[async_trait]
impl AgentAdapter for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _task: &Task, workspace: &Path) -> Result<AgentResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with {
            return Err(AgentError::ExecutionFailed(message.to_string()));
        }
        if let Some((file, content)) = self.write_file {
            std::fs::write(workspace.join(file), content)?;
        }
        Ok(AgentResult::new(true, "stub transcript", 2)
            .with_tokens(Some(321))
            .with_version(Some("stub 1.0".to_string()))
            .with_model(Some("stub-model".to_string())))
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tasks")).unwrap();
        Self { dir }
    }

    fn add_task(&self, id: &str, command: &str, timeout: u64) -> Task {
        let yaml = format!(
            "id: {id}\n\
             title: Task {id}\n\
             category: bug-fix\n\
             difficulty: easy\n\
             source:\n  repository: none\n  commit: HEAD\n\
             prompt: Make the check pass.\n\
             verification:\n  type: command\n  command: {cmd}\n  timeout: {timeout}\n\
             permissions:\n  write: true\n",
            id = id,
            cmd = serde_json::to_string(command).unwrap(),
            timeout = timeout,
        );
        let path = self.dir.path().join("tasks").join(format!("{}.yaml", id));
        std::fs::write(&path, yaml).unwrap();
        Task::from_file(&path).unwrap()
    }

    fn config(&self) -> RunnerConfig {
        RunnerConfig::new()
            .with_tasks_dir(self.dir.path().join("tasks"))
            .with_results_dir(self.results_dir())
            .with_workspace_dir(self.dir.path().join("workspaces"))
    }

    fn runner(&self) -> TaskRunner {
        TaskRunner::new(self.config())
    }

    fn results_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("results")
    }

    fn saved_results(&self) -> Vec<BenchmarkResult> {
        agent_bench::runner::summary::collect_results(&self.results_dir()).unwrap()
    }
}

#[tokio::test]
async fn test_passing_verification_scores_100() {
    let fx = Fixture::new();
    let task = fx.add_task("fix-1", "true", 10);

    let result = fx.runner().execute_task(&task, &StubAgent::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.score, 100);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.tokens_used, Some(321));
    assert_eq!(result.agent_version.as_deref(), Some("stub 1.0"));
    assert_eq!(result.model_name.as_deref(), Some("stub-model"));
    assert_eq!(result.agent_output.as_deref(), Some("stub transcript"));
    assert!(result
        .verification_output
        .as_deref()
        .unwrap()
        .starts_with("Exit code: 0"));
    assert!(result.error.is_none());

    let saved = fx.saved_results();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].run_id, result.run_id);
}

#[tokio::test]
async fn test_failing_verification_scores_0() {
    let fx = Fixture::new();
    let task = fx.add_task("fix-1", "false", 10);

    let result = fx.runner().execute_task(&task, &StubAgent::new()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.score, 0);
    assert_eq!(result.error.as_deref(), Some("Verification tests failed"));
    assert_eq!(result.iterations, 2);
    assert!(result.agent_output.is_some());
    assert!(result.verification_output.is_some());
    assert_eq!(fx.saved_results().len(), 1);
}

#[tokio::test]
async fn test_verification_sees_agent_changes() {
    let fx = Fixture::new();
    let task = fx.add_task("feat-1", "test -f answer.txt", 10);

    let runner = fx.runner();
    let without = runner.execute_task(&task, &StubAgent::new()).await.unwrap();
    assert!(!without.success);

    let with = runner
        .execute_task(&task, &StubAgent::new().writing("answer.txt", "42"))
        .await
        .unwrap();
    assert!(with.success);
}

#[tokio::test]
async fn test_stale_workspace_is_recreated() {
    let fx = Fixture::new();
    let task = fx.add_task("fix-1", "test ! -e sentinel.txt", 10);

    let runner = fx.runner();
    let workspace = runner.workspaces().path_for(&task);
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::write(workspace.join("sentinel.txt"), "stale").unwrap();

    let result = runner.execute_task(&task, &StubAgent::new()).await.unwrap();
    assert!(result.success);
    assert!(!workspace.join("sentinel.txt").exists());
}

#[tokio::test]
async fn test_agent_error_is_failure_and_not_persisted() {
    let fx = Fixture::new();
    let task = fx.add_task("fix-1", "true", 10);

    let result = fx
        .runner()
        .execute_task(&task, &StubAgent::new().failing("backend exploded"))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.score, 0);
    assert_eq!(result.iterations, 0);
    assert_eq!(
        result.error.as_deref(),
        Some("Agent execution failed: backend exploded")
    );
    assert!(fx.saved_results().is_empty());
}

#[tokio::test]
async fn test_verification_timeout_is_reported() {
    let fx = Fixture::new();
    let task = fx.add_task("slow-1", "sleep 5", 1);

    let result = fx.runner().execute_task(&task, &StubAgent::new()).await.unwrap();

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Verification failed: Verification command timed out after 1 seconds")
    );
    assert_eq!(result.iterations, 2);
    assert_eq!(result.agent_output.as_deref(), Some("stub transcript"));
    assert!(result.verification_output.is_none());
    assert_eq!(fx.saved_results().len(), 1);
}

#[tokio::test]
async fn test_workspace_failure_skips_agent() {
    let fx = Fixture::new();
    let yaml = "id: clone-1\ntitle: Clone\ncategory: feature\ndifficulty: hard\n\
                source:\n  repository: /nonexistent/agent-bench/repo\n  commit: HEAD\n\
                prompt: p\nverification:\n  type: command\n  command: 'true'\n";
    let task = Task::from_yaml(yaml).unwrap();
    let agent = StubAgent::new();

    let result = fx.runner().execute_task(&task, &agent).await.unwrap();

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to prepare workspace: Git operation failed:"));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_all_with_cli_agent_aggregates() {
    let fx = Fixture::new();
    fx.add_task("a-pass", "true", 10);
    fx.add_task("b-fail", "false", 10);
    fx.add_task("c-pass", "true", 10);

    // `echo` stands in for the agent binary: it prints its arguments and exits 0.
    let agent = AgentConfig::claude().with_name("echo-agent").with_command("echo");
    let suite = fx.runner().run_all(&agent).await.unwrap();

    assert_eq!(suite.agent, "echo-agent");
    assert_eq!(suite.total_tasks, 3);
    assert_eq!(suite.passed, 2);
    assert_eq!(suite.failed, 1);
    assert!((suite.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    let sum: f64 = suite.results.iter().map(|r| r.duration_secs).sum();
    assert!((suite.total_duration_secs - sum).abs() < 1e-9);

    let suite_files = std::fs::read_dir(fx.results_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("suite_echo-agent_"))
        .count();
    assert_eq!(suite_files, 1);
    assert_eq!(fx.saved_results().len(), 3);
}

#[tokio::test]
async fn test_run_task_applies_iteration_override() {
    let fx = Fixture::new();
    fx.add_task("fix-1", "true", 10);

    let runner = TaskRunner::new(fx.config().with_max_iterations(Some(2)));
    let agent = AgentConfig::claude()
        .with_command("true")
        .with_iteration_delay(std::time::Duration::ZERO);
    let result = runner.run_task("fix-1", &agent).await.unwrap();

    // `true` never prints the completion marker, so both iterations are used.
    assert_eq!(result.iterations, 2);
    assert!(result.success);
}

#[tokio::test]
#[ignore] // Requires the `claude` CLI and credentials.
async fn test_real_claude_cli_creates_file() {
    let fx = Fixture::new();
    let task = fx.add_task("tools-1", "test -f hello.txt", 30);
    let agent = AgentConfig::claude().with_max_iterations(1);
    let adapter = agent_bench::runner::create_adapter(&agent);

    let result = fx
        .runner()
        .execute_task(&task, adapter.as_ref())
        .await
        .unwrap();
    println!("{:?}", result);
}
