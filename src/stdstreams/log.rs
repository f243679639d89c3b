// src/stdstreams/log.rs

//! Shared, thread-safe line buffer for one run.
//!
//! A [`Log`] is a cheap handle around a single mutex. The process runner's
//! stream copiers write into it through [`StreamWriter`]s while any number of
//! viewers read snapshots. Every mutation and every read takes the same lock,
//! so readers only ever see whole lines.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::Result;
use crate::exec::OutputSink;
use crate::stdstreams::writer::StreamWriter;
use crate::stdstreams::{Line, Stream};

/// Version tag of the durable encoding produced by [`Log::to_binary`].
const BINARY_VERSION: u32 = 1;

#[derive(Default)]
struct Inner {
    lines: Vec<Line>,
    stdout_partial: Vec<u8>,
    stderr_partial: Vec<u8>,
}

impl Inner {
    fn partial_mut(&mut self, stream: Stream) -> &mut Vec<u8> {
        match stream {
            Stream::Stdout => &mut self.stdout_partial,
            Stream::Stderr => &mut self.stderr_partial,
        }
    }

    fn push_line(&mut self, stream: Stream, bytes: &[u8]) {
        self.lines.push(Line {
            stream,
            time: Utc::now(),
            text: String::from_utf8_lossy(bytes).into_owned(),
        });
    }

    /// Materialize a non-empty accumulator as a final line.
    fn flush_stream(&mut self, stream: Stream) {
        let partial = std::mem::take(self.partial_mut(stream));
        if !partial.is_empty() {
            self.push_line(stream, &partial);
        }
    }
}

#[derive(Serialize)]
struct BinaryLogRef<'a> {
    version: u32,
    lines: &'a [Line],
}

#[derive(Deserialize)]
struct BinaryLog {
    version: u32,
    lines: Vec<Line>,
}

/// Captured stdout/stderr of one run, in flush order across both streams.
#[derive(Clone, Default)]
pub struct Log {
    inner: Arc<Mutex<Inner>>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frozen log from already captured lines.
    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                lines,
                ..Inner::default()
            })),
        }
    }

    /// Writer feeding the stdout accumulator.
    pub fn stdout(&self) -> StreamWriter {
        StreamWriter::new(self.clone(), Stream::Stdout)
    }

    /// Writer feeding the stderr accumulator.
    pub fn stderr(&self) -> StreamWriter {
        StreamWriter::new(self.clone(), Stream::Stderr)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("log mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        })
    }

    /// Append raw bytes to one stream, emitting a line per `\n` seen.
    pub(crate) fn append(&self, stream: Stream, mut bytes: &[u8]) {
        let mut inner = self.lock();

        while let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
            let mut line = std::mem::take(inner.partial_mut(stream));
            line.extend_from_slice(&bytes[..pos]);
            inner.push_line(stream, &line);
            bytes = &bytes[pos + 1..];
        }

        inner.partial_mut(stream).extend_from_slice(bytes);
    }

    /// Turn trailing output without a final newline into lines.
    ///
    /// Called once, when the owning process has exited and both streams are
    /// drained.
    pub fn flush(&self) {
        let mut inner = self.lock();
        inner.flush_stream(Stream::Stderr);
        inner.flush_stream(Stream::Stdout);
    }

    /// Snapshot of all complete lines so far.
    pub fn lines(&self) -> Vec<Line> {
        self.lock().lines.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durable encoding of the full line sequence.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let inner = self.lock();
        let doc = BinaryLogRef {
            version: BINARY_VERSION,
            lines: &inner.lines,
        };
        Ok(serde_json::to_vec(&doc)?)
    }

    /// Inverse of [`Log::to_binary`].
    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        let doc: BinaryLog = serde_json::from_slice(bytes)?;
        if doc.version != BINARY_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported log encoding version {}",
                doc.version
            ))
            .into());
        }
        Ok(Self::from_lines(doc.lines))
    }

    /// JSON array of the lines at index `skip` and later.
    ///
    /// Polling viewers pass the number of lines they already hold. A `skip`
    /// past the end yields an empty array.
    pub fn to_incremental(&self, skip: usize) -> Result<Vec<u8>> {
        let inner = self.lock();
        let start = skip.min(inner.lines.len());
        Ok(serde_json::to_vec(&inner.lines[start..])?)
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log").field("lines", &self.len()).finish()
    }
}

impl OutputSink for Log {
    fn stdout(&self) -> Box<dyn std::io::Write + Send> {
        Box::new(Log::stdout(self))
    }

    fn stderr(&self) -> Box<dyn std::io::Write + Send> {
        Box::new(Log::stderr(self))
    }

    fn flush(&self) {
        Log::flush(self);
    }
}
