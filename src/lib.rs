//! agent-bench: benchmark harness for AI coding agents.
//!
//! This library loads benchmark tasks, runs coding agents against them in
//! isolated workspaces, verifies the outcome with each task's command and
//! persists the results.

pub mod cli;
pub mod error;
pub mod runner;
pub mod task;

pub use error::{BenchError, Result};
