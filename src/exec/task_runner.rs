// src/exec/task_runner.rs

//! Individual job process runner.

use std::io::Write;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::exec::backend::{Job, Outcome};
use crate::exec::OutputSink;

const COPY_BUF_SIZE: usize = 8 * 1024;

/// Run a single job to completion and report its outcome.
///
/// The outcome callback runs on the blocking pool since it usually persists
/// the finished run.
pub async fn run_job(job: Job) {
    let Job {
        command,
        args,
        sink,
        on_done,
    } = job;

    let outcome = match run_job_inner(&command, &args, sink.as_ref()).await {
        Ok(code) => Outcome::Exited(code),
        Err(err) => {
            let reason = format!("{err:#}");
            error!(cmd = %command, error = %reason, "job execution error");
            Outcome::Faulted(reason)
        }
    };

    sink.flush();

    if let Err(err) = tokio::task::spawn_blocking(move || on_done(outcome)).await {
        error!(cmd = %command, error = %err, "completion callback panicked");
    }
}

async fn run_job_inner(command: &str, args: &[String], sink: &dyn OutputSink) -> Result<i32> {
    info!(cmd = %command, ?args, "starting process");

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process '{command}'"))?;

    let stdout = child.stdout.take().context("child stdout was not captured")?;
    let stderr = child.stderr.take().context("child stderr was not captured")?;

    let out_copier = tokio::spawn(copy_stream(stdout, sink.stdout()));
    let err_copier = tokio::spawn(copy_stream(stderr, sink.stderr()));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process '{command}'"))?;

    // Drain both pipes before the sink is flushed.
    let out_bytes = out_copier.await.context("stdout copier panicked")??;
    let err_bytes = err_copier.await.context("stderr copier panicked")??;

    let code = status.code().unwrap_or(-1);
    info!(
        cmd = %command,
        exit_code = code,
        success = status.success(),
        stdout_bytes = out_bytes,
        stderr_bytes = err_bytes,
        "process exited"
    );

    Ok(code)
}

/// Copy a child pipe into a sink writer until EOF.
async fn copy_stream<R>(mut reader: R, mut writer: Box<dyn Write + Send>) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await.context("reading child output")?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .context("writing child output to sink")?;
        total += n as u64;
    }

    debug!(bytes = total, "stream drained");
    Ok(total)
}
