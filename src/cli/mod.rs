//! Command-line interface for agent-bench.
//!
//! Provides commands for listing tasks, running agents against them and
//! consolidating results.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
