//! Discovery of task files under a tasks directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::Task;
use crate::error::{BenchError, Result};

/// Loads every `*.yaml` / `*.yml` task below a directory.
#[derive(Debug, Clone)]
pub struct TaskLoader {
    tasks_dir: PathBuf,
}

impl TaskLoader {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
        }
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// Loads all tasks, skipping files that fail to load and duplicate ids.
    ///
    /// A missing tasks directory yields an empty list.
    pub fn load_all(&self) -> Vec<Task> {
        let mut tasks = Vec::new();
        if !self.tasks_dir.exists() {
            debug!("Tasks directory {} does not exist", self.tasks_dir.display());
            return tasks;
        }

        let mut seen = HashSet::new();
        for path in self.task_files() {
            match Task::from_file(&path) {
                Ok(task) => {
                    if !seen.insert(task.id.clone()) {
                        warn!(
                            path = %path.display(),
                            task_id = %task.id,
                            "Duplicate task id, skipping"
                        );
                        continue;
                    }
                    tasks.push(task);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load task, skipping");
                }
            }
        }

        tasks
    }

    /// Loads a single task by id.
    pub fn load_by_id(&self, task_id: &str) -> Result<Task> {
        self.load_all()
            .into_iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| BenchError::TaskNotFound(task_id.to_string()))
    }

    /// Lists the ids of every loadable task.
    pub fn list_ids(&self) -> Vec<String> {
        self.load_all().into_iter().map(|task| task.id).collect()
    }

    fn task_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.tasks_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Failed to read tasks directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        files.sort();
        files
    }
}
