// src/storage/schema.rs

//! On-disk layout.
//!
//! redb has no nested buckets, so every task gets its own pair of tables:
//!
//! - `runs/<task_id>`: big-endian run id -> JSON run record
//! - `logs/<task_id>`: big-endian run id -> encoded [`Log`](crate::stdstreams::Log)
//!
//! plus one shared `sequences` table holding the last id handed out per task.

use redb::{TableDefinition, WriteTransaction};

use crate::errors::Result;
use crate::model::Task;

pub const RUNS_PREFIX: &str = "runs/";
pub const LOGS_PREFIX: &str = "logs/";

pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub type RecordTable<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

pub fn runs_table_name(task_id: &str) -> String {
    format!("{RUNS_PREFIX}{task_id}")
}

pub fn logs_table_name(task_id: &str) -> String {
    format!("{LOGS_PREFIX}{task_id}")
}

pub fn record_table(name: &str) -> RecordTable<'_> {
    TableDefinition::new(name)
}

/// Create whatever tables are missing for the given catalog.
///
/// Existing tables (and the runs in them) are left untouched, including those
/// of tasks that were since removed from the catalog.
pub fn ensure_schema(txn: &WriteTransaction, tasks: &[Task]) -> Result<()> {
    txn.open_table(SEQUENCES)?;

    for task in tasks {
        txn.open_table(record_table(&runs_table_name(&task.id)))?;
        txn.open_table(record_table(&logs_table_name(&task.id)))?;
    }

    Ok(())
}
