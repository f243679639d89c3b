// src/model.rs

//! Core domain types shared by the storage, execution and service layers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OptaskError;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Task-scoped run identifier.
///
/// Ids are handed out by the store, start at 1 and only ever grow. They are
/// rendered as plain decimal strings (`"1"`, `"2"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    /// Placeholder for a run that has not been created in the store yet.
    pub const UNASSIGNED: RunId = RunId(0);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }

    /// Fixed-width big-endian key, so byte order equals numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = OptaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(OptaskError::InvalidRunId(s.to_string())),
            Ok(n) => Ok(RunId(n)),
        }
    }
}

/// A configured, reusable command definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Task {
    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.cmd.clone()
        } else {
            format!("{} {}", self.cmd, self.args.join(" "))
        }
    }
}

/// One execution of a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub started: DateTime<Utc>,
    /// Unset while the process is alive.
    pub completed: Option<DateTime<Utc>>,
    /// Unset while the process is alive.
    pub exit_code: Option<i32>,
}

impl Run {
    /// A fresh, unassigned run starting now.
    pub fn started_now() -> Self {
        Self {
            id: RunId::UNASSIGNED,
            started: Utc::now(),
            completed: None,
            exit_code: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// Record the completion fields. Must only happen once per run.
    pub fn complete(&mut self, exit_code: i32, at: DateTime<Utc>) {
        debug_assert!(!self.is_completed(), "run {} completed twice", self.id);
        self.completed = Some(at);
        self.exit_code = Some(exit_code);
    }

    /// Wall-clock time spent so far (running) or in total (completed).
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.completed.unwrap_or(now) - self.started
    }
}
