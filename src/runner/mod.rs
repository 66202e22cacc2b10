//! Benchmark runner for AI coding agents.
//!
//! This module provides the pipeline that runs an agent against a task and
//! records whether the task's verification command passes afterwards.
//!
//! # Architecture
//!
//! ```text
//! Task (YAML) → Workspace → Agent Adapter → Verifier → Result JSON
//! ```
//!
//! The runner:
//! 1. Recreates an isolated workspace and clones the task's repository
//! 2. Launches the agent inside it under a timeout
//! 3. Runs the verification command in the same workspace
//! 4. Persists a [`BenchmarkResult`] with both transcripts
//!
//! # Example
//!
//! ```ignore
//! use agent_bench::runner::{AgentConfig, RunnerConfig, TaskRunner};
//!
//! let runner = TaskRunner::new(RunnerConfig::default().with_tasks_dir("./tasks"));
//! let result = runner.run_task("fix-1", &AgentConfig::claude()).await?;
//!
//! println!("Score: {}", result.score);
//! ```

pub mod agents;
pub mod config;
pub mod executor;
pub mod process;
pub mod result;
pub mod summary;
pub mod verifier;
pub mod workspace;

pub use agents::{create_adapter, AgentAdapter, AgentConfig, AgentError, AgentResult, AgentType};
pub use config::{AgentProfiles, ConfigError, RunnerConfig};
pub use executor::{RunStage, TaskRunner};
pub use result::{BenchmarkResult, SuiteResults, TokenUsage};
pub use verifier::{VerificationResult, Verifier};
pub use workspace::WorkspaceManager;
