// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The service hands [`Job`]s to an `Executor` instead of spawning processes
//! itself. Production uses [`Runner`](super::Runner); tests can provide an
//! implementation that holds jobs and completes them on demand.

use std::fmt;

use crate::errors::Result;
use crate::exec::OutputSink;

/// Terminal result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The process ran and exited. Non-zero codes are normal outcomes, and a
    /// process terminated by a signal reports `-1`.
    Exited(i32),
    /// The process could not be started or supervised.
    Faulted(String),
}

impl Outcome {
    /// Exit code to record on the run. Faults are recorded as `-1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Faulted(_) => -1,
        }
    }
}

/// Completion callback. Fires exactly once, after the sink was flushed.
pub type DoneFn = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// One command submission.
pub struct Job {
    pub command: String,
    pub args: Vec<String>,
    pub sink: Box<dyn OutputSink>,
    pub on_done: DoneFn,
}

impl Job {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        sink: impl OutputSink,
        on_done: impl FnOnce(Outcome) + Send + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            sink: Box::new(sink),
            on_done: Box::new(on_done),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("command", &self.command)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how jobs are executed.
pub trait Executor: Send + Sync + 'static {
    /// Enqueue a job. Must return without waiting for the job to run.
    fn submit(&self, job: Job) -> Result<()>;
}
