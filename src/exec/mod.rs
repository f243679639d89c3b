// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs task commands with `tokio::process::Command` and streams
//! their output into an [`OutputSink`]. It knows nothing about runs, storage
//! or the task catalog.
//!
//! - [`backend`] defines the [`Executor`] seam, the [`Job`] submitted through
//!   it and the [`Outcome`] reported back.
//! - [`executor_loop`] owns the dispatcher loop and the production
//!   [`Runner`].
//! - [`task_runner`] supervises a single child process.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

use std::io::Write;

pub use backend::{DoneFn, Executor, Job, Outcome};
pub use executor_loop::{Runner, spawn_dispatcher};

/// Destination for a child process's standard streams.
///
/// The runner fully drains both streams into the writers returned here and
/// then calls [`OutputSink::flush`] exactly once before reporting the outcome.
pub trait OutputSink: Send + Sync + 'static {
    fn stdout(&self) -> Box<dyn Write + Send>;
    fn stderr(&self) -> Box<dyn Write + Send>;
    fn flush(&self);
}
