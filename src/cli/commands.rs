//! CLI command definitions for agent-bench.
//!
//! Three commands cover the workflow: `list` the available tasks, `run` an
//! agent against one task or the whole suite, and `collect` persisted results
//! into a CSV summary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};

use crate::error::BenchError;
use crate::runner::config::{DEFAULT_RESULTS_DIR, DEFAULT_TASKS_DIR, DEFAULT_WORKSPACE_DIR};
use crate::runner::summary::{collect_results, write_csv};
use crate::runner::{AgentProfiles, BenchmarkResult, RunnerConfig, TaskRunner};

/// Default agent profile for `run`.
const DEFAULT_AGENT: &str = "claude";

/// File name of the CSV written by `collect` when no output is given.
const DEFAULT_SUMMARY_FILE: &str = "summary.csv";

/// Benchmark harness for AI coding agents.
#[derive(Parser)]
#[command(name = "agent-bench")]
#[command(about = "Run AI coding agents against benchmark tasks and record the results")]
#[command(version)]
#[command(
    long_about = "agent-bench runs AI coding agents against predefined tasks.\n\nEach task clones a repository, hands the agent a prompt, and checks the result with a verification command.\n\nExample usage:\n  agent-bench list -v\n  agent-bench run --task fix-1 --agent claude\n  agent-bench run --suite all --agent claude-sdk\n  agent-bench collect --output results/summary.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Directory containing task YAML files.
    #[arg(long, env = "AGENT_BENCH_TASKS_DIR", default_value = DEFAULT_TASKS_DIR, global = true)]
    pub tasks_dir: PathBuf,

    /// Directory where results are written.
    #[arg(long, env = "AGENT_BENCH_RESULTS_DIR", default_value = DEFAULT_RESULTS_DIR, global = true)]
    pub results_dir: PathBuf,

    /// Root directory for task workspaces.
    #[arg(long, env = "AGENT_BENCH_WORKSPACE_DIR", default_value = DEFAULT_WORKSPACE_DIR, global = true)]
    pub workspace_dir: PathBuf,

    /// YAML file with named agent profiles.
    #[arg(long, env = "AGENT_BENCH_AGENTS_FILE", global = true)]
    pub agents_file: Option<PathBuf>,

    /// Enable debug logging (same as --log-level debug).
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

impl Cli {
    /// Log filter requested on the command line; `RUST_LOG` still wins.
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new()
            .with_tasks_dir(&self.tasks_dir)
            .with_results_dir(&self.results_dir)
            .with_workspace_dir(&self.workspace_dir)
    }

    fn profiles(&self) -> anyhow::Result<AgentProfiles> {
        match self.agents_file {
            Some(ref path) => Ok(AgentProfiles::from_file(path)?),
            None => Ok(AgentProfiles::default()),
        }
    }
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// List available tasks.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Run an agent against one task or the whole suite.
    Run(RunArgs),

    /// Consolidate result files into a CSV summary.
    Collect(CollectArgs),
}

/// Arguments for `agent-bench list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show category, difficulty, repository and tags.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for `agent-bench run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run a single task by id.
    #[arg(long, conflicts_with = "suite")]
    pub task: Option<String>,

    /// Run every task; the name labels the run.
    #[arg(long)]
    pub suite: Option<String>,

    /// Agent profile or built-in agent type (claude, claude-sdk).
    #[arg(short, long, default_value = DEFAULT_AGENT)]
    pub agent: String,

    /// Override the agent's iteration cap.
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Arguments for `agent-bench collect`.
#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// CSV output path (default: <results-dir>/summary.csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::List(ref args) => run_list_command(&cli, args),
        Commands::Run(ref args) => run_run_command(&cli, args).await,
        Commands::Collect(ref args) => run_collect_command(&cli, args),
    }
}

fn run_list_command(cli: &Cli, args: &ListArgs) -> anyhow::Result<()> {
    let runner = TaskRunner::new(cli.runner_config());
    let tasks = runner.list_tasks();

    if tasks.is_empty() {
        println!("No tasks found in {}", cli.tasks_dir.display());
        return Ok(());
    }

    println!("Available tasks ({}):", tasks.len());
    for task in &tasks {
        println!("  {}: {}", task.id, task.title);
        if args.verbose {
            println!("    Category:   {}", task.category);
            println!("    Difficulty: {}", task.difficulty);
            println!("    Repository: {}", task.source.repository);
            if !task.metadata.tags.is_empty() {
                println!("    Tags:       {}", task.metadata.tags.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_run_command(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    if args.task.is_none() && args.suite.is_none() {
        println!("Specify a task or suite to run:");
        println!("  agent-bench run --task <id> [--agent <name>]");
        println!("  agent-bench run --suite <name> [--agent <name>]");
        return Ok(());
    }

    let profiles = cli.profiles()?;
    let agent = match profiles.resolve(&args.agent) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error: {}", e);
            let known: Vec<&str> = profiles.names().collect();
            if known.is_empty() {
                eprintln!("Known agents: claude, claude-sdk");
            } else {
                eprintln!("Known agents: claude, claude-sdk, {}", known.join(", "));
            }
            return Ok(());
        }
    };
    debug!("Resolved agent profile {:?}", agent);

    let runner = TaskRunner::new(cli.runner_config().with_max_iterations(args.max_iterations));

    if let Some(ref task_id) = args.task {
        info!("Running task {} with agent {}", task_id, agent.name);
        let result = match runner.run_task(task_id, &agent).await {
            Ok(result) => result,
            Err(BenchError::TaskNotFound(id)) => {
                eprintln!("Error: Task not found: {}", id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        print_task_result(&result);
    } else if let Some(ref suite) = args.suite {
        info!("Running suite {} with agent {}", suite, agent.name);
        let results = runner.run_all(&agent).await?;

        println!("\n=== Suite Results: {} ===", suite);
        println!("Agent:          {}", results.agent);
        println!("Total tasks:    {}", results.total_tasks);
        println!("Passed:         {}", results.passed);
        println!("Failed:         {}", results.failed);
        println!("Pass rate:      {:.1}%", results.pass_rate * 100.0);
        println!("Total duration: {:.2}s", results.total_duration_secs);
    }

    Ok(())
}

fn run_collect_command(cli: &Cli, args: &CollectArgs) -> anyhow::Result<()> {
    let results = collect_results(&cli.results_dir)?;
    if results.is_empty() {
        println!("No results found in {}", cli.results_dir.display());
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| cli.results_dir.join(DEFAULT_SUMMARY_FILE));
    write_csv(&results, &output)?;
    println!("Wrote {} result(s) to {}", results.len(), output.display());
    Ok(())
}

fn print_task_result(result: &BenchmarkResult) {
    let status = if result.success { "PASS" } else { "FAIL" };
    println!("\n=== Task Result: {} ===", result.task_id);
    println!("Status:     {}", status);
    println!("Score:      {}", result.score);
    println!("Iterations: {}", result.iterations);
    println!("Duration:   {:.2}s", result.duration_secs);
    if let Some(tokens) = result.tokens_used {
        println!("Tokens:     {}", tokens);
    }
    if let Some(ref error) = result.error {
        println!("Error:      {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["agent-bench", "run", "--task", "fix-1"]).expect("should parse");
        assert_eq!(cli.log_filter(), "info");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.task.as_deref(), Some("fix-1"));
                assert!(args.suite.is_none());
                assert_eq!(args.agent, DEFAULT_AGENT);
                assert!(args.max_iterations.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_all_options() {
        let cli = Cli::try_parse_from([
            "agent-bench",
            "--tasks-dir",
            "./my-tasks",
            "--debug",
            "run",
            "--suite",
            "nightly",
            "-a",
            "claude-sdk",
            "--max-iterations",
            "4",
            "--results-dir",
            "./out",
        ])
        .expect("should parse");

        assert_eq!(cli.tasks_dir, PathBuf::from("./my-tasks"));
        assert_eq!(cli.results_dir, PathBuf::from("./out"));
        assert_eq!(cli.log_filter(), "debug");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.suite.as_deref(), Some("nightly"));
                assert_eq!(args.agent, "claude-sdk");
                assert_eq!(args.max_iterations, Some(4));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_task_and_suite_conflict() {
        let result = Cli::try_parse_from(["agent-bench", "run", "--task", "a", "--suite", "b"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_alias_and_verbose() {
        let cli = Cli::try_parse_from(["agent-bench", "ls", "-v"]).expect("should parse with alias");
        match cli.command {
            Commands::List(args) => assert!(args.verbose),
            _ => panic!("Expected List command"),
        }
    }

    #[tokio::test]
    async fn test_collect_writes_default_csv() {
        let dir = TempDir::new().unwrap();
        let results_dir = dir.path().join("results");
        BenchmarkResult::success("fix-1", "claude", 1.0)
            .save(&results_dir)
            .unwrap();

        let cli = Cli::try_parse_from([
            "agent-bench",
            "--results-dir",
            results_dir.to_str().unwrap(),
            "collect",
        ])
        .unwrap();
        run_with_cli(cli).await.unwrap();

        let csv = std::fs::read_to_string(results_dir.join("summary.csv")).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("fix-1,claude,"));
    }

    #[tokio::test]
    async fn test_run_unknown_agent_is_reported_not_error() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "agent-bench",
            "--tasks-dir",
            dir.path().to_str().unwrap(),
            "run",
            "--task",
            "fix-1",
            "--agent",
            "aider",
        ])
        .unwrap();
        assert!(run_with_cli(cli).await.is_ok());
    }
}
