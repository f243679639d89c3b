#![allow(dead_code)]

use std::path::PathBuf;

use optask::config::{ConfigFile, RawConfigFile, TaskConfig};
use optask::model::Task;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                name: "testing".to_string(),
                database: PathBuf::from("optask.db"),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`. The display name defaults to the id.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(id: &str, cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                id: id.to_string(),
                name: id.to_string(),
                cmd: cmd.to_string(),
                args: vec![],
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.task.args.push(arg.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// The two-task catalog most tests use: `t1` runs `true`, `t2` runs `false`.
pub fn true_false_catalog() -> Vec<Task> {
    ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("t1", "true").name("Task 1").build())
        .with_task(TaskConfigBuilder::new("t2", "false").name("Task 2").build())
        .build()
        .tasks
}

/// A task running `sh -c <script>`.
pub fn shell_task(id: &str, script: &str) -> Task {
    TaskConfigBuilder::new(id, "sh")
        .arg("-c")
        .arg(script)
        .build()
        .into()
}
