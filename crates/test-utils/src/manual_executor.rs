use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use optask::errors::{OptaskError, Result};
use optask::exec::{Executor, Job, OutputSink, Outcome};

/// An executor that never spawns processes.
///
/// Submitted jobs are parked until the test completes them explicitly, which
/// makes the in-flight window of a run fully controllable.
#[derive(Clone, Default)]
pub struct ManualExecutor {
    jobs: Arc<Mutex<Vec<Job>>>,
    reject: Arc<AtomicBool>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `submit` fail.
    pub fn reject_submissions(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Command lines of the parked jobs, oldest first.
    pub fn pending_commands(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| {
                let mut parts = vec![job.command.clone()];
                parts.extend(job.args.iter().cloned());
                parts.join(" ")
            })
            .collect()
    }

    /// Feed `stdout` into the oldest parked job's sink, flush it and report
    /// `outcome`. Returns false if nothing was pending.
    pub fn complete_next(&self, stdout: &str, outcome: Outcome) -> bool {
        let job = {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.is_empty() {
                return false;
            }
            jobs.remove(0)
        };

        job.sink.stdout().write_all(stdout.as_bytes()).unwrap();
        job.sink.flush();
        (job.on_done)(outcome);
        true
    }
}

impl Executor for ManualExecutor {
    fn submit(&self, job: Job) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(OptaskError::Execution("submission rejected".to_string()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
