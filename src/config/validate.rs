// src/config/validate.rs

use std::collections::HashSet;

use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{OptaskError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = OptaskError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_fields(cfg)?;
    validate_unique_ids(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(OptaskError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

/// Every task needs an id, a name and a command. All offending entries are
/// logged before the first one is returned as the error.
fn validate_task_fields(cfg: &RawConfigFile) -> Result<()> {
    let mut first_error = None;

    for (index, task) in cfg.task.iter().enumerate() {
        if let Some(msg) = task_field_error(index, task) {
            warn!(index, id = %task.id, "{msg}");
            first_error.get_or_insert(msg);
        }
    }

    match first_error {
        Some(msg) => Err(OptaskError::ConfigError(msg)),
        None => Ok(()),
    }
}

fn task_field_error(index: usize, task: &TaskConfig) -> Option<String> {
    let missing = [
        ("id", task.id.trim().is_empty()),
        ("name", task.name.trim().is_empty()),
        ("cmd", task.cmd.trim().is_empty()),
    ]
    .into_iter()
    .find(|(_, empty)| *empty)
    .map(|(attr, _)| attr);

    if let Some(attr) = missing {
        return Some(format!("task (index: {index}) is missing attribute '{attr}'"));
    }

    if task.id.contains('/') {
        return Some(format!(
            "task (index: {index}) id '{}' must not contain '/'",
            task.id
        ));
    }

    None
}

fn validate_unique_ids(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in cfg.task.iter() {
        if !seen.insert(task.id.as_str()) {
            return Err(OptaskError::ConfigError(format!(
                "duplicate task id '{}'",
                task.id
            )));
        }
    }
    Ok(())
}
