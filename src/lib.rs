// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod model;
pub mod service;
pub mod stdstreams;
pub mod storage;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::exec::Executor;
use crate::model::{Run, RunId};
use crate::service::Service;
use crate::stdstreams::{Line, Stream};
use crate::storage::Store;

/// How often `exec` polls a live run for new output.
const FOLLOW_INTERVAL: Duration = Duration::from_millis(200);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the run store
/// - the service with the real process runner
///
/// and then executes the requested subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let db_path = cfg.database_path(&config_root_dir(&config_path));
    debug!(db = %db_path.display(), "opening run store");
    let store = Store::open(&db_path, &cfg.tasks)?;

    let service = Service::new(cfg.name.clone(), cfg.tasks.clone(), store);

    match args.command {
        Command::Tasks => print_tasks(&service)?,
        Command::Exec { task } => exec_task(&service, &task).await?,
        Command::History {
            task,
            before,
            count,
        } => {
            let before = before.as_deref().map(str::parse::<RunId>).transpose()?;
            let runs = service.runs(&task, before, count)?;
            println!("{} / {}", service.project(), service.task(&task)?.name);
            for run in &runs {
                println!("  {}", describe_run(run));
            }
        }
        Command::Latest => {
            for (task_id, run) in service.latest_runs()? {
                println!("{task_id}: {}", describe_run(&run));
            }
        }
        Command::Show {
            task,
            run,
            skip,
            json,
        } => {
            let run_id: RunId = run.parse()?;
            let log = service.std_streams(&task, run_id)?;
            if json {
                let bytes = log.to_incremental(skip)?;
                std::io::stdout().write_all(&bytes)?;
                println!();
            } else {
                print_lines(&log.lines(), skip);
            }
        }
    }

    Ok(())
}

/// One-line report of a top-level error, including its context chain.
pub fn error_report(err: &anyhow::Error) -> String {
    format!("optask error: {err:#}")
}

/// Directory relative database paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "ops/Optask.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Optask.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_tasks<E: Executor>(service: &Service<E>) -> Result<()> {
    let latest = service.latest_runs()?;

    println!("{}", service.project());
    for task in service.list_tasks() {
        println!("  {} ({}): {}", task.id, task.name, task.command_line());
        match latest.get(&task.id) {
            Some(run) => println!("      last: {}", describe_run(run)),
            None => println!("      never ran"),
        }
        for run_id in service.running(&task.id) {
            println!("      running: #{run_id}");
        }
    }

    Ok(())
}

/// Start a run and poll it until it finishes.
///
/// The child process belongs to this process's runtime, so returning before
/// the run is finalized would kill it.
async fn exec_task<E: Executor>(service: &Service<E>, task_id: &str) -> Result<()> {
    let run_id = service.exec(task_id)?;
    println!("started run #{run_id} of '{task_id}'");

    let mut seen = 0;
    loop {
        // Sample the flag before the log so the last fetch is the final one.
        let running = service.is_running(task_id, run_id);
        let log = service.std_streams(task_id, run_id)?;
        seen = print_lines(&log.lines(), seen);

        if !running {
            break;
        }
        tokio::time::sleep(FOLLOW_INTERVAL).await;
    }

    let run = service.run(task_id, run_id)?;
    println!("{}", describe_run(&run));
    Ok(())
}

/// Print lines past `skip`, stdout lines to stdout and stderr lines to
/// stderr. Returns the number of lines now consumed.
fn print_lines(lines: &[Line], skip: usize) -> usize {
    for line in lines.iter().skip(skip) {
        match line.stream {
            Stream::Stdout => println!("{}", line.text),
            Stream::Stderr => eprintln!("{}", line.text),
        }
    }
    lines.len().max(skip)
}

fn describe_run(run: &Run) -> String {
    let duration = run.duration(Utc::now()).num_seconds();
    let status = match run.exit_code {
        Some(code) if run.is_completed() => format!("exit {code}"),
        _ => "running".to_string(),
    };
    format!(
        "#{} {} started {} ({}s)",
        run.id,
        status,
        run.started.format("%Y-%m-%d %H:%M:%S"),
        duration
    )
}
