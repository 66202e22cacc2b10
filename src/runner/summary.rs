//! Consolidation of per-run result files into a CSV summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::result::{BenchmarkResult, SUITE_FILE_PREFIX};
use crate::error::Result;

/// Column order of the summary CSV.
pub const CSV_COLUMNS: &[&str] = &[
    "task_id",
    "agent",
    "agent_version",
    "model_name",
    "timestamp",
    "success",
    "score",
    "iterations",
    "duration_secs",
    "tokens_used",
    "error",
];

/// Maximum number of characters of the error message kept in the CSV.
pub const ERROR_PREVIEW_CHARS: usize = 100;

/// Loads every per-run result file in `dir`, sorted by file name.
///
/// Suite summaries and files that fail to parse are skipped.
pub fn collect_results(dir: &Path) -> Result<Vec<BenchmarkResult>> {
    if !dir.is_dir() {
        warn!("Results directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let is_suite = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with(SUITE_FILE_PREFIX));
        if is_suite {
            debug!("Skipping suite file {}", path.display());
            continue;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<BenchmarkResult>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(result) => results.push(result),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    Ok(results)
}

/// Renders results as CSV text with a header row.
pub fn to_csv(results: &[BenchmarkResult]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');

    for r in results {
        let error: String = r
            .error
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(ERROR_PREVIEW_CHARS)
            .collect();
        let fields = [
            r.task_id.clone(),
            r.agent.clone(),
            r.agent_version.clone().unwrap_or_default(),
            r.model_name.clone().unwrap_or_default(),
            r.timestamp.to_rfc3339(),
            r.success.to_string(),
            r.score.to_string(),
            r.iterations.to_string(),
            format!("{:.2}", r.duration_secs),
            r.tokens_used.map(|t| t.to_string()).unwrap_or_default(),
            error,
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        let _ = writeln!(out, "{}", row.join(","));
    }

    out
}

/// Writes the CSV summary to `path`, creating parent directories.
pub fn write_csv(results: &[BenchmarkResult], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_csv(results))?;
    Ok(())
}

// RFC 4180: quote fields containing separators, quotes or line breaks.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
