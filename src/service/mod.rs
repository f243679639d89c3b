// src/service/mod.rs

//! Orchestration layer between the task catalog, the executor and the store.
//!
//! The service is the only place where a run moves from "live" (in the
//! in-flight table, log in memory) to "persisted" (run record and log in the
//! store). The completion callback persists first and removes the in-flight
//! entry afterwards, so a reader always finds the run in one of the two.
//!
//! History queries (`runs`, `latest_runs`) only return run records that carry
//! completion fields, so a run only shows up in history once it has been
//! finalized.

mod in_flight;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::errors::{OptaskError, Result};
use crate::exec::{Executor, Job, Outcome, Runner};
use crate::model::{Run, RunId, Task, TaskId};
use crate::stdstreams::Log;
use crate::storage::Store;
use in_flight::{InFlight, InFlightTable};

/// Task execution service.
pub struct Service<E: Executor = Runner> {
    project: String,
    tasks: Vec<Task>,
    store: Arc<Store>,
    executor: E,
    in_flight: Arc<InFlightTable>,
}

impl Service<Runner> {
    /// Build a service backed by the real process [`Runner`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(project: impl Into<String>, tasks: Vec<Task>, store: Store) -> Self {
        Self::with_executor(project, tasks, store, Runner::new())
    }
}

impl<E: Executor> Service<E> {
    pub fn with_executor(
        project: impl Into<String>,
        tasks: Vec<Task>,
        store: Store,
        executor: E,
    ) -> Self {
        Self {
            project: project.into(),
            tasks,
            store: Arc::new(store),
            executor,
            in_flight: Arc::new(InFlightTable::default()),
        }
    }

    /// Display name of the project the catalog belongs to.
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn list_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Result<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or_else(|| OptaskError::TaskNotFound(id.to_string()))
    }

    /// Start a new run of `task_id` and return its id without waiting for it.
    pub fn exec(&self, task_id: &str) -> Result<RunId> {
        let task = self.task(task_id)?;

        let log = Log::new();
        let mut run = Run::started_now();
        self.store.create_run(&task.id, &mut run)?;
        let run_id = run.id;

        self.in_flight.insert(&task.id, run, log.clone());
        info!(task = %task.id, run_id = %run_id, cmd = %task.command_line(), "run started");

        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let owner = task.id.clone();
        let job = Job::new(task.cmd.clone(), task.args.clone(), log, move |outcome| {
            complete_run(&store, &in_flight, &owner, run_id, outcome);
        });

        if let Err(err) = self.executor.submit(job) {
            error!(task = %task.id, run_id = %run_id, error = %err, "failed to submit run");
            complete_run(
                &self.store,
                &self.in_flight,
                &task.id,
                run_id,
                Outcome::Faulted(err.to_string()),
            );
            return Err(err);
        }

        Ok(run_id)
    }

    /// A single run, in flight or finished.
    ///
    /// In-flight runs are read from the store as well; they only lack the
    /// completion fields there.
    pub fn run(&self, task_id: &str, run_id: RunId) -> Result<Run> {
        self.task(task_id)?;
        self.store.run(task_id, run_id)
    }

    /// Completed history, newest first. See [`Store::finished_runs`].
    pub fn runs(&self, task_id: &str, before: Option<RunId>, count: usize) -> Result<Vec<Run>> {
        self.task(task_id)?;
        self.store.finished_runs(task_id, before, count)
    }

    /// Most recent completed run per task; tasks without one are absent.
    pub fn latest_runs(&self) -> Result<BTreeMap<TaskId, Run>> {
        self.store.latest_finished_runs()
    }

    pub fn is_running(&self, task_id: &str, run_id: RunId) -> bool {
        self.in_flight.contains(task_id, run_id)
    }

    /// Ids of the runs of `task_id` whose process is still alive.
    pub fn running(&self, task_id: &str) -> Vec<RunId> {
        self.in_flight.run_ids(task_id)
    }

    /// The output of a run: live while in flight, persisted afterwards.
    pub fn std_streams(&self, task_id: &str, run_id: RunId) -> Result<Log> {
        if let Some(log) = self.in_flight.log(task_id, run_id) {
            return Ok(log);
        }
        self.task(task_id)?;
        self.store.log(task_id, run_id)
    }
}

/// Completion path of one run. Runs at most once per run id.
fn complete_run(
    store: &Store,
    in_flight: &InFlightTable,
    task_id: &str,
    run_id: RunId,
    outcome: Outcome,
) {
    let Some(InFlight { mut run, log }) = in_flight.get(task_id, run_id) else {
        warn!(task = %task_id, run_id = %run_id, "completion for a run that is not in flight");
        return;
    };

    if let Outcome::Faulted(reason) = &outcome {
        error!(task = %task_id, run_id = %run_id, error = %reason, "run faulted");
    }

    let exit_code = outcome.exit_code();
    run.complete(exit_code, Utc::now());

    match store.finalize_run(task_id, &run, &log) {
        Ok(()) => info!(
            task = %task_id,
            run_id = %run_id,
            exit_code,
            lines = log.len(),
            "run finished"
        ),
        Err(err) => error!(
            task = %task_id,
            run_id = %run_id,
            error = %err,
            "failed to persist finished run"
        ),
    }

    in_flight.remove(task_id, run_id);
}
