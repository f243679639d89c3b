// src/stdstreams/writer.rs

use std::io;

use crate::stdstreams::{Log, Stream};

/// `io::Write` handle for one stream of a [`Log`].
///
/// Writes never fail and never block beyond the log's mutex; `flush` is a
/// no-op because partial lines are only materialized by [`Log::flush`].
#[derive(Debug, Clone)]
pub struct StreamWriter {
    log: Log,
    stream: Stream,
}

impl StreamWriter {
    pub(crate) fn new(log: Log, stream: Stream) -> Self {
        Self { log, stream }
    }
}

impl io::Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.log.append(self.stream, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
