// src/exec/executor_loop.rs

//! Dispatcher loop that admits jobs and fans them out.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{OptaskError, Result};
use crate::exec::backend::{Executor, Job, Outcome};
use crate::exec::task_runner::run_job;
use crate::exec::OutputSink;

/// Spawn the background dispatcher loop.
///
/// The returned sender is unbounded, so submitting never waits on a running
/// job. Every received job gets its own Tokio task; there is no limit on how
/// many run at once and no ordering between them.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_dispatcher() -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    tokio::spawn(async move {
        info!("dispatcher loop started");

        while let Some(job) = rx.recv().await {
            debug!(cmd = %job.command, "dispatching job");
            tokio::spawn(run_job(job));
        }

        info!("dispatcher loop finished (channel closed)");
    });

    tx
}

/// Production executor: one dispatcher, one process per job.
#[derive(Debug, Clone)]
pub struct Runner {
    tx: mpsc::UnboundedSender<Job>,
}

impl Runner {
    /// Create a runner and start its dispatcher loop.
    pub fn new() -> Self {
        Self {
            tx: spawn_dispatcher(),
        }
    }

    /// Schedule `command args...` writing into `sink`; `on_done` receives the
    /// outcome once the process exited and its output was flushed.
    pub fn run(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        sink: impl OutputSink,
        on_done: impl FnOnce(Outcome) + Send + 'static,
    ) -> Result<()> {
        self.submit(Job::new(command, args, sink, on_done))
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for Runner {
    fn submit(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| OptaskError::Execution("dispatcher loop is not running".to_string()))
    }
}
