// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::Task;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// name = "Ops"
/// database = "optask.db"
///
/// [[task]]
/// id = "backup"
/// name = "Nightly backup"
/// cmd = "rsync"
/// args = ["-a", "src/", "dst/"]
/// ```
///
/// Tasks are an array of tables so that their order is preserved.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Project name shown by front-ends.
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Path of the run database. Relative paths are resolved against the
    /// directory of the config file.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

fn default_project_name() -> String {
    "optask".to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("optask.db")
}

/// One `[[task]]` entry.
///
/// Missing fields deserialize as empty and are reported by validation with
/// the index of the offending entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<TaskConfig> for Task {
    fn from(cfg: TaskConfig) -> Self {
        Task {
            id: cfg.id,
            name: cfg.name,
            cmd: cfg.cmd,
            args: cfg.args,
        }
    }
}

/// Validated configuration. Only constructed through
/// `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub name: String,
    pub database: PathBuf,
    pub tasks: Vec<Task>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            name: raw.name,
            database: raw.database,
            tasks: raw.task.into_iter().map(Task::from).collect(),
        }
    }

    /// Database path with a relative path anchored at `root`.
    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            root.join(&self.database)
        }
    }
}
