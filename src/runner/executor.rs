//! Task runner - the main benchmark pipeline.
//!
//! One task run moves through a fixed sequence of stages:
//!
//! ```text
//! Init → WorkspaceReady → AgentExecuted → Verified → Persisted
//! ```
//!
//! Any stage may fail instead. Workspace and agent failures end the run with an
//! in-memory failure; verification outcomes are always persisted together with
//! the agent's transcript.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::agents::{create_adapter, AgentAdapter, AgentConfig};
use super::config::RunnerConfig;
use super::result::{BenchmarkResult, SuiteResults};
use super::verifier::Verifier;
use super::workspace::WorkspaceManager;
use crate::error::Result;
use crate::task::{Task, TaskLoader};

/// Stage reached by a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Init,
    WorkspaceReady,
    AgentExecuted,
    Verified,
    Persisted,
    Failed,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStage::Init => "init",
            RunStage::WorkspaceReady => "workspace-ready",
            RunStage::AgentExecuted => "agent-executed",
            RunStage::Verified => "verified",
            RunStage::Persisted => "persisted",
            RunStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Book-keeping for a single run in progress.
struct TaskRun<'a> {
    task: &'a Task,
    agent: &'a str,
    stage: RunStage,
    start: Instant,
}

impl<'a> TaskRun<'a> {
    fn start(task: &'a Task, agent: &'a str) -> Self {
        Self {
            task,
            agent,
            stage: RunStage::Init,
            start: Instant::now(),
        }
    }

    fn advance(&mut self, stage: RunStage) {
        debug!(task_id = %self.task.id, from = %self.stage, to = %stage, "Run stage");
        self.stage = stage;
    }

    fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn fail(&mut self, message: String) -> BenchmarkResult {
        error!(task_id = %self.task.id, stage = %self.stage, "{}", message);
        let result = BenchmarkResult::failure(&self.task.id, self.agent, self.elapsed_secs(), message);
        self.advance(RunStage::Failed);
        result
    }
}

/// Runs tasks against agents and persists the results.
pub struct TaskRunner {
    config: RunnerConfig,
    loader: TaskLoader,
    workspaces: WorkspaceManager,
    verifier: Verifier,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            loader: TaskLoader::new(&config.tasks_dir),
            workspaces: WorkspaceManager::new(&config.workspace_dir),
            verifier: Verifier::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RunnerConfig::default())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// All loadable tasks, in file order.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.loader.load_all()
    }

    /// Runs one task by id with the given agent profile.
    pub async fn run_task(&self, task_id: &str, agent: &AgentConfig) -> Result<BenchmarkResult> {
        let task = self.loader.load_by_id(task_id)?;
        let adapter = create_adapter(&self.config.apply_to(agent));
        self.execute_task(&task, adapter.as_ref()).await
    }

    /// Runs every task sequentially and saves the suite summary.
    pub async fn run_all(&self, agent: &AgentConfig) -> Result<SuiteResults> {
        let adapter = create_adapter(&self.config.apply_to(agent));
        let tasks = self.list_tasks();
        if tasks.is_empty() {
            warn!("No tasks found in {}", self.config.tasks_dir.display());
        }
        info!("Running {} task(s) with agent {}", tasks.len(), adapter.name());

        let mut results = Vec::with_capacity(tasks.len());
        for task in &tasks {
            println!("\nRunning task: {} - {}", task.id, task.title);
            let result = self.execute_task(task, adapter.as_ref()).await?;
            print_result_line(&result);
            results.push(result);
        }

        let suite = SuiteResults::from_results(adapter.name(), results);
        let path = suite.save(&self.config.results_dir)?;
        println!("\nSuite results saved to: {}", path.display());
        Ok(suite)
    }

    /// Runs the full pipeline for one task.
    ///
    /// Stage failures become failed results; only persistence errors are
    /// returned as `Err`.
    pub async fn execute_task(&self, task: &Task, agent: &dyn AgentAdapter) -> Result<BenchmarkResult> {
        let mut run = TaskRun::start(task, agent.name());
        info!("Starting task {} with agent {}", task.id, agent.name());

        let workspace = match self.workspaces.prepare(task).await {
            Ok(path) => path,
            Err(e) => return Ok(run.fail(format!("Failed to prepare workspace: {}", e))),
        };
        run.advance(RunStage::WorkspaceReady);
        debug!("Workspace ready at {}", workspace.display());

        let agent_result = match agent.execute(task, &workspace).await {
            Ok(result) => result,
            Err(e) => return Ok(run.fail(format!("Agent execution failed: {}", e))),
        };
        run.advance(RunStage::AgentExecuted);
        info!(
            "Agent finished task {} (success: {}, iterations: {})",
            task.id, agent_result.success, agent_result.iterations
        );

        let verification = match self.verifier.verify(task, &workspace).await {
            Ok(verification) => verification,
            Err(e) => {
                let result = run
                    .fail(format!("Verification failed: {}", e))
                    .with_agent_result(&agent_result)
                    .with_agent_output(agent_result.output.clone());
                return self.persist(&mut run, result);
            }
        };
        run.advance(RunStage::Verified);

        let result = if verification.passed {
            BenchmarkResult::success(&task.id, agent.name(), run.elapsed_secs())
        } else {
            BenchmarkResult::failure(
                &task.id,
                agent.name(),
                run.elapsed_secs(),
                "Verification tests failed",
            )
        }
        .with_agent_result(&agent_result)
        .with_agent_output(agent_result.output.clone())
        .with_verification_output(verification.report());

        self.persist(&mut run, result)
    }

    fn persist(&self, run: &mut TaskRun<'_>, result: BenchmarkResult) -> Result<BenchmarkResult> {
        let path = result.save(&self.config.results_dir)?;
        if run.stage != RunStage::Failed {
            run.advance(RunStage::Persisted);
        }
        info!(
            "Task {} {} in {:.2}s, saved to {}",
            result.task_id,
            result.status_label(),
            result.duration_secs,
            path.display()
        );
        Ok(result)
    }

    /// Results directory configured for this runner.
    pub fn results_dir(&self) -> &Path {
        &self.config.results_dir
    }
}

fn print_result_line(result: &BenchmarkResult) {
    let status = if result.success { "PASS" } else { "FAIL" };
    println!(
        "  Result: {} (score: {}, duration: {:.2}s)",
        status, result.score, result.duration_secs
    );
    if let Some(ref error) = result.error {
        println!("  Error: {}", error);
    }
}
