// src/storage/mod.rs

//! Durable run history backed by an embedded redb database.
//!
//! Every public operation is a single transaction: it either commits fully
//! or leaves the database unchanged. Run ids are allocated per task from the
//! `sequences` table inside the same transaction that writes the run, so they
//! start at 1, never repeat and never leave gaps.
//!
//! Keys are 8-byte big-endian run ids, which makes byte order equal numeric
//! order. Newest-first pagination is a reverse range scan.
//!
//! redb holds an exclusive lock on the file, so a run record that is still
//! unfinished when the database is opened belongs to a process that died.
//! [`Store::open`] closes such records out with [`ORPHANED_EXIT_CODE`].

pub mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::Utc;
use redb::{
    Database, Range, ReadOnlyTable, ReadTransaction, ReadableTable, TableError, TableHandle,
    WriteTransaction,
};
use tracing::{debug, error, info};

use crate::errors::{OptaskError, Result};
use crate::model::{Run, RunId, Task, TaskId};
use crate::stdstreams::Log;
use schema::{RUNS_PREFIX, SEQUENCES, logs_table_name, record_table, runs_table_name};

/// Exit code recorded for runs whose process outlived the optask process
/// that started it.
pub const ORPHANED_EXIT_CODE: i32 = -1;

/// Storage adapter owning the database handle and its schema.
pub struct Store {
    db: Database,
    /// Task namespaces present in the database.
    tasks: BTreeSet<TaskId>,
}

impl Store {
    /// Open (or create) the database at `path` and make sure every catalog
    /// task has its tables.
    pub fn open(path: impl AsRef<Path>, tasks: &[Task]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        schema::ensure_schema(&txn, tasks)?;
        let recovered = recover_orphaned_runs(&txn)?;
        txn.commit()?;

        let mut known = BTreeSet::new();
        {
            let txn = db.begin_read()?;
            for handle in txn.list_tables()? {
                if let Some(task_id) = handle.name().strip_prefix(RUNS_PREFIX) {
                    known.insert(task_id.to_string());
                }
            }
        }

        info!(
            path = %path.display(),
            tasks = known.len(),
            recovered,
            "opened run store"
        );

        Ok(Self { db, tasks: known })
    }

    fn ensure_task(&self, task_id: &str) -> Result<()> {
        if self.tasks.contains(task_id) {
            Ok(())
        } else {
            Err(OptaskError::TaskNotFound(task_id.to_string()))
        }
    }

    /// Assign the next id of `task_id` to `run` and persist it.
    pub fn create_run(&self, task_id: &str, run: &mut Run) -> Result<()> {
        self.ensure_task(task_id)?;

        let mut record = run.clone();
        let txn = self.db.begin_write()?;
        {
            let mut sequences = txn.open_table(SEQUENCES)?;
            let last = sequences.get(task_id)?.map(|guard| guard.value()).unwrap_or(0);
            record.id = RunId(last + 1);
            sequences.insert(task_id, record.id.0)?;

            let bytes = encode_run(&record)?;
            let name = runs_table_name(task_id);
            let mut runs = txn.open_table(record_table(&name))?;
            runs.insert(record.id.to_key().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;

        debug!(task = %task_id, run_id = %record.id, "created run");
        run.id = record.id;
        Ok(())
    }

    /// Overwrite the record of an already created run.
    pub fn save_run(&self, task_id: &str, run: &Run) -> Result<()> {
        self.ensure_task(task_id)?;
        ensure_assigned(run.id)?;

        let bytes = encode_run(run)?;
        let txn = self.db.begin_write()?;
        {
            let name = runs_table_name(task_id);
            let mut runs = txn.open_table(record_table(&name))?;
            runs.insert(run.id.to_key().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Point lookup of a single run.
    pub fn run(&self, task_id: &str, run_id: RunId) -> Result<Run> {
        let txn = self.db.begin_read()?;
        let runs = open_read(&txn, &runs_table_name(task_id), task_id)?;
        let found = runs.get(run_id.to_key().as_slice())?;
        match found {
            Some(value) => decode_run(value.value()),
            None => Err(OptaskError::RunNotFound {
                task: task_id.to_string(),
                run: run_id.to_string(),
            }),
        }
    }

    /// Up to `count` runs, newest first.
    ///
    /// With `before`, listing starts strictly below that id. Running out of
    /// history yields a shorter result, not an error.
    pub fn runs(&self, task_id: &str, before: Option<RunId>, count: usize) -> Result<Vec<Run>> {
        self.scan_runs(task_id, before, count, |_| true)
    }

    /// Like [`Store::runs`], but only runs that have completion fields.
    ///
    /// Filtering happens inside one read transaction, so a run that is
    /// created or finished concurrently is either skipped or returned
    /// complete.
    pub fn finished_runs(
        &self,
        task_id: &str,
        before: Option<RunId>,
        count: usize,
    ) -> Result<Vec<Run>> {
        self.scan_runs(task_id, before, count, Run::is_completed)
    }

    /// The most recent run of every task that has at least one.
    pub fn latest_runs(&self) -> Result<BTreeMap<TaskId, Run>> {
        self.scan_latest(|_| true)
    }

    /// The most recent completed run of every task that has one.
    pub fn latest_finished_runs(&self) -> Result<BTreeMap<TaskId, Run>> {
        self.scan_latest(Run::is_completed)
    }

    fn scan_runs(
        &self,
        task_id: &str,
        before: Option<RunId>,
        count: usize,
        keep: impl Fn(&Run) -> bool,
    ) -> Result<Vec<Run>> {
        let txn = self.db.begin_read()?;
        let runs = open_read(&txn, &runs_table_name(task_id), task_id)?;

        let bound;
        let range = match before {
            None => runs.iter()?,
            Some(id) => {
                bound = id.to_key();
                runs.range::<&[u8]>(..bound.as_slice())?
            }
        };

        // Errors pass the filter so they surface instead of being skipped.
        newest_first(range)
            .filter(|run| run.as_ref().map_or(true, &keep))
            .take(count)
            .collect()
    }

    fn scan_latest(&self, keep: impl Fn(&Run) -> bool) -> Result<BTreeMap<TaskId, Run>> {
        let txn = self.db.begin_read()?;
        let mut latest = BTreeMap::new();

        for handle in txn.list_tables()? {
            let Some(task_id) = handle.name().strip_prefix(RUNS_PREFIX) else {
                continue;
            };
            let runs = txn.open_table(record_table(handle.name()))?;
            for run in newest_first(runs.iter()?) {
                let run = run?;
                if keep(&run) {
                    latest.insert(task_id.to_string(), run);
                    break;
                }
            }
        }

        Ok(latest)
    }

    /// Persist the finalized log of a run.
    pub fn save_log(&self, task_id: &str, run_id: RunId, log: &Log) -> Result<()> {
        self.ensure_task(task_id)?;
        ensure_assigned(run_id)?;

        let bytes = log.to_binary()?;
        let txn = self.db.begin_write()?;
        {
            let name = logs_table_name(task_id);
            let mut logs = txn.open_table(record_table(&name))?;
            logs.insert(run_id.to_key().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load a persisted log.
    pub fn log(&self, task_id: &str, run_id: RunId) -> Result<Log> {
        let txn = self.db.begin_read()?;
        let logs = open_read(&txn, &logs_table_name(task_id), task_id)?;
        let found = logs.get(run_id.to_key().as_slice())?;
        match found {
            Some(value) => Log::from_binary(value.value()),
            None => Err(OptaskError::LogNotFound {
                task: task_id.to_string(),
                run: run_id.to_string(),
            }),
        }
    }

    /// Write a completed run and its log in one transaction.
    pub fn finalize_run(&self, task_id: &str, run: &Run, log: &Log) -> Result<()> {
        self.ensure_task(task_id)?;
        ensure_assigned(run.id)?;

        let run_bytes = encode_run(run)?;
        let log_bytes = log.to_binary()?;
        let key = run.id.to_key();

        let txn = self.db.begin_write()?;
        {
            let runs_name = runs_table_name(task_id);
            let mut runs = txn.open_table(record_table(&runs_name))?;
            runs.insert(key.as_slice(), run_bytes.as_slice())?;

            let logs_name = logs_table_name(task_id);
            let mut logs = txn.open_table(record_table(&logs_name))?;
            logs.insert(key.as_slice(), log_bytes.as_slice())?;
        }
        txn.commit()?;

        debug!(task = %task_id, run_id = %run.id, "finalized run");
        Ok(())
    }
}

fn open_read(
    txn: &ReadTransaction,
    name: &str,
    task_id: &str,
) -> Result<ReadOnlyTable<&'static [u8], &'static [u8]>> {
    match txn.open_table(record_table(name)) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(_)) => Err(OptaskError::TaskNotFound(task_id.to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Decode a range of run records, highest id first.
fn newest_first<'a>(
    range: Range<'a, &'static [u8], &'static [u8]>,
) -> impl Iterator<Item = Result<Run>> + 'a {
    range.rev().map(|entry| {
        let (_, value) = entry?;
        decode_run(value.value())
    })
}

/// Complete every unfinished run record with [`ORPHANED_EXIT_CODE`] and give
/// it an empty log if it has none. Returns how many runs were closed out.
fn recover_orphaned_runs(txn: &WriteTransaction) -> Result<usize> {
    let mut names = Vec::new();
    for handle in txn.list_tables()? {
        if handle.name().starts_with(RUNS_PREFIX) {
            names.push(handle.name().to_string());
        }
    }

    let now = Utc::now();
    let empty_log = Log::new().to_binary()?;
    let mut recovered = 0;

    for name in names {
        let task_id = &name[RUNS_PREFIX.len()..];
        let mut runs = txn.open_table(record_table(&name))?;

        let mut orphans = Vec::new();
        for entry in runs.iter()? {
            let (_, value) = entry?;
            let run = decode_run(value.value())?;
            if !run.is_completed() {
                orphans.push(run);
            }
        }
        if orphans.is_empty() {
            continue;
        }

        let logs_name = logs_table_name(task_id);
        let mut logs = txn.open_table(record_table(&logs_name))?;

        for mut run in orphans {
            run.complete(ORPHANED_EXIT_CODE, now);
            let key = run.id.to_key();
            let bytes = encode_run(&run)?;
            runs.insert(key.as_slice(), bytes.as_slice())?;
            if logs.get(key.as_slice())?.is_none() {
                logs.insert(key.as_slice(), empty_log.as_slice())?;
            }
            error!(
                task = %task_id,
                run_id = %run.id,
                exit_code = ORPHANED_EXIT_CODE,
                "run was left unfinished by a previous process"
            );
            recovered += 1;
        }
    }

    Ok(recovered)
}

fn ensure_assigned(run_id: RunId) -> Result<()> {
    if run_id.is_assigned() {
        Ok(())
    } else {
        Err(OptaskError::InvalidRunId(
            "run has not been created in the store yet".to_string(),
        ))
    }
}

fn encode_run(run: &Run) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(run)?)
}

fn decode_run(bytes: &[u8]) -> Result<Run> {
    Ok(serde_json::from_slice(bytes)?)
}
