// src/stdstreams/mod.rs

//! Line-oriented capture of a process's standard streams.
//!
//! - [`log`] owns the shared [`Log`] buffer and its serialized forms.
//! - [`writer`] provides the per-stream `io::Write` handles that the process
//!   runner copies child output into.

pub mod log;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use log::Log;
pub use writer::StreamWriter;

/// Which standard stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One captured line of output, newline stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub stream: Stream,
    pub time: DateTime<Utc>,
    pub text: String,
}
