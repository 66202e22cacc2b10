//! Error types for agent-bench operations.
//!
//! Each pipeline stage maps its failures onto a [`BenchError`] variant so the
//! runner can turn them into a failed benchmark result with a readable message.

use std::time::Duration;

use thiserror::Error;

use crate::runner::agents::AgentError;

/// Errors raised while loading tasks, driving agents, verifying or persisting.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task format: {0}")]
    InvalidTaskFormat(String),

    #[error("{0}")]
    TaskLoad(String),

    #[error("{0}")]
    AgentExecution(#[from] AgentError),

    #[error("{0}")]
    Verification(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, BenchError>;
