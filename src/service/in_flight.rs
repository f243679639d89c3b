// src/service/in_flight.rs

//! In-memory table of runs whose process has not exited yet.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::model::{Run, RunId, TaskId};
use crate::stdstreams::Log;

/// A live run together with the log its process is writing into.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub run: Run,
    pub log: Log,
}

/// Per-task map of in-flight runs.
///
/// Written by `exec` on the caller's thread and by completion callbacks on
/// the blocking pool, so every access goes through the one mutex.
#[derive(Debug, Default)]
pub(crate) struct InFlightTable {
    runs: Mutex<HashMap<TaskId, HashMap<RunId, InFlight>>>,
}

impl InFlightTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, HashMap<RunId, InFlight>>> {
        self.runs.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("in-flight table mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        })
    }

    pub fn insert(&self, task_id: &str, run: Run, log: Log) {
        self.lock()
            .entry(task_id.to_string())
            .or_default()
            .insert(run.id, InFlight { run, log });
    }

    pub fn get(&self, task_id: &str, run_id: RunId) -> Option<InFlight> {
        self.lock()
            .get(task_id)
            .and_then(|runs| runs.get(&run_id))
            .cloned()
    }

    pub fn log(&self, task_id: &str, run_id: RunId) -> Option<Log> {
        self.get(task_id, run_id).map(|entry| entry.log)
    }

    pub fn contains(&self, task_id: &str, run_id: RunId) -> bool {
        self.lock()
            .get(task_id)
            .is_some_and(|runs| runs.contains_key(&run_id))
    }

    pub fn remove(&self, task_id: &str, run_id: RunId) -> Option<InFlight> {
        let mut table = self.lock();
        let runs = table.get_mut(task_id)?;
        let removed = runs.remove(&run_id);
        if runs.is_empty() {
            table.remove(task_id);
        }
        removed
    }

    /// Ids of the in-flight runs of one task, ascending.
    pub fn run_ids(&self, task_id: &str) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self
            .lock()
            .get(task_id)
            .map(|runs| runs.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}
