use std::io::Write;

use chrono::Utc;
use optask::errors::OptaskError;
use optask::model::{Run, RunId, Task};
use optask::stdstreams::Log;
use optask::storage::{ORPHANED_EXIT_CODE, Store};
use optask_test_utils::builders::{TaskConfigBuilder, true_false_catalog};
use optask_test_utils::{TempStore, init_tracing};

fn create(store: &Store, task: &str) -> Run {
    let mut run = Run::started_now();
    store.create_run(task, &mut run).unwrap();
    run
}

fn ids(runs: &[Run]) -> Vec<u64> {
    runs.iter().map(|r| r.id.0).collect()
}

#[test]
fn test_create_run_assigns_ids_from_one() {
    init_tracing();
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let first = create(&store, "t1");
    let second = create(&store, "t1");

    assert_eq!(first.id, RunId(1));
    assert_eq!(second.id, RunId(2));
}

#[test]
fn test_run_ids_are_scoped_per_task() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    create(&store, "t1");
    create(&store, "t1");
    let other = create(&store, "t2");

    assert_eq!(other.id, RunId(1));
    assert_eq!(store.run("t1", RunId(2)).unwrap().id, RunId(2));
    assert!(matches!(
        store.run("t2", RunId(2)),
        Err(OptaskError::RunNotFound { .. })
    ));
}

#[test]
fn test_run_lookup_returns_persisted_record() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let run = create(&store, "t1");
    let loaded = store.run("t1", run.id).unwrap();

    assert_eq!(loaded, run);
    assert!(loaded.completed.is_none());
    assert!(loaded.exit_code.is_none());
}

#[test]
fn test_unknown_task_is_not_found() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let mut run = Run::started_now();
    let err = store.create_run("nope", &mut run).unwrap_err();
    assert!(matches!(err, OptaskError::TaskNotFound(ref id) if id == "nope"));
    assert!(!run.id.is_assigned());

    assert!(matches!(
        store.run("nope", RunId(1)),
        Err(OptaskError::TaskNotFound(_))
    ));
    assert!(matches!(
        store.runs("nope", None, 10),
        Err(OptaskError::TaskNotFound(_))
    ));
    assert!(matches!(
        store.log("nope", RunId(1)),
        Err(OptaskError::TaskNotFound(_))
    ));
}

#[test]
fn test_save_run_overwrites_completion_fields() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let mut run = create(&store, "t2");
    run.complete(1, Utc::now());
    store.save_run("t2", &run).unwrap();

    let loaded = store.run("t2", run.id).unwrap();
    assert_eq!(loaded.exit_code, Some(1));
    assert_eq!(loaded.completed, run.completed);
}

#[test]
fn test_save_run_rejects_unassigned_id() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let run = Run::started_now();
    assert!(matches!(
        store.save_run("t1", &run),
        Err(OptaskError::InvalidRunId(_))
    ));
}

#[test]
fn test_runs_newest_first() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    for _ in 0..5 {
        create(&store, "t1");
    }

    assert_eq!(ids(&store.runs("t1", None, 3).unwrap()), vec![5, 4, 3]);
}

#[test]
fn test_runs_before_is_exclusive() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    for _ in 0..5 {
        create(&store, "t1");
    }

    let before: RunId = "3".parse().unwrap();
    assert_eq!(ids(&store.runs("t1", Some(before), 10).unwrap()), vec![2, 1]);
    assert!(store.runs("t1", Some(RunId(1)), 10).unwrap().is_empty());
}

#[test]
fn test_runs_before_unknown_id_starts_below_it() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    for _ in 0..3 {
        create(&store, "t1");
    }

    assert_eq!(ids(&store.runs("t1", Some(RunId(100)), 2).unwrap()), vec![3, 2]);
}

#[test]
fn test_runs_count_beyond_history_returns_short_page() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    create(&store, "t1");
    create(&store, "t1");

    assert_eq!(ids(&store.runs("t1", None, 50).unwrap()), vec![2, 1]);
    assert!(store.runs("t2", None, 50).unwrap().is_empty());
    assert!(store.runs("t1", None, 0).unwrap().is_empty());
}

#[test]
fn test_pagination_walks_whole_history() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    for _ in 0..7 {
        create(&store, "t1");
    }

    let mut seen = Vec::new();
    let mut before = None;
    loop {
        let page = store.runs("t1", before, 3).unwrap();
        if page.is_empty() {
            break;
        }
        before = page.last().map(|r| r.id);
        seen.extend(ids(&page));
    }

    assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn test_latest_runs_omits_tasks_without_runs() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    assert!(store.latest_runs().unwrap().is_empty());

    create(&store, "t1");
    create(&store, "t1");

    let latest = store.latest_runs().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest["t1"].id, RunId(2));
    assert!(!latest.contains_key("t2"));
}

#[test]
fn test_log_round_trip_through_store() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    let run = create(&store, "t1");

    let log = Log::new();
    log.stdout().write_all(b"hello\n").unwrap();
    store.save_log("t1", run.id, &log).unwrap();

    let loaded = store.log("t1", run.id).unwrap();
    assert_eq!(loaded.lines().len(), 1);
    assert_eq!(loaded.lines()[0].text, "hello");
    assert_eq!(loaded.lines(), log.lines());
}

#[test]
fn test_missing_log_is_log_not_found() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    let run = create(&store, "t1");

    let err = store.log("t1", run.id).unwrap_err();
    assert!(matches!(err, OptaskError::LogNotFound { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_finalize_run_persists_run_and_log_together() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());
    let mut run = create(&store, "t2");

    let log = Log::new();
    log.stderr().write_all(b"failed").unwrap();
    log.flush();
    run.complete(1, Utc::now());

    store.finalize_run("t2", &run, &log).unwrap();

    assert_eq!(store.run("t2", run.id).unwrap(), run);
    assert_eq!(store.log("t2", run.id).unwrap().lines(), log.lines());
}

#[test]
fn test_history_and_sequence_survive_reopen() {
    let tmp = TempStore::new();
    let tasks = true_false_catalog();

    {
        let store = tmp.open(&tasks);
        create(&store, "t1");
        create(&store, "t1");
    }

    let store = tmp.open(&tasks);
    assert_eq!(store.latest_runs().unwrap()["t1"].id, RunId(2));
    assert_eq!(create(&store, "t1").id, RunId(3));
}

#[test]
fn test_reopen_with_new_task_creates_its_namespace() {
    let tmp = TempStore::new();
    let mut tasks = true_false_catalog();

    drop(tmp.open(&tasks));

    let extra: Task = TaskConfigBuilder::new("t3", "echo").arg("hi").build().into();
    tasks.push(extra);
    let store = tmp.open(&tasks);

    assert_eq!(create(&store, "t3").id, RunId(1));
}

#[test]
fn test_removed_task_history_stays_readable() {
    let tmp = TempStore::new();
    let tasks = true_false_catalog();

    {
        let store = tmp.open(&tasks);
        create(&store, "t2");
    }

    let store = tmp.open(&tasks[..1]);
    assert_eq!(store.run("t2", RunId(1)).unwrap().id, RunId(1));
    assert!(store.latest_runs().unwrap().contains_key("t2"));
}

#[test]
fn test_store_creates_missing_parent_directories() {
    let tmp = TempStore::new();
    let path = tmp.dir().join("nested").join("dir").join("runs.db");

    let store = Store::open(&path, &true_false_catalog()).unwrap();
    create(&store, "t1");
    assert!(path.exists());
}

#[test]
fn test_finished_queries_skip_unfinished_runs() {
    let tmp = TempStore::new();
    let store = tmp.open(&true_false_catalog());

    let mut first = create(&store, "t1");
    first.complete(0, Utc::now());
    store.save_run("t1", &first).unwrap();
    create(&store, "t1");
    create(&store, "t2");

    assert_eq!(ids(&store.runs("t1", None, 10).unwrap()), vec![2, 1]);
    assert_eq!(ids(&store.finished_runs("t1", None, 10).unwrap()), vec![1]);
    assert_eq!(ids(&store.finished_runs("t1", None, usize::MAX).unwrap()), vec![1]);
    assert!(store.finished_runs("t1", None, 0).unwrap().is_empty());

    let latest = store.latest_finished_runs().unwrap();
    assert_eq!(latest["t1"].id, RunId(1));
    assert!(!latest.contains_key("t2"));
}

#[test]
fn test_reopen_closes_out_runs_left_unfinished() {
    init_tracing();
    let tmp = TempStore::new();
    let tasks = true_false_catalog();

    let finished = {
        let store = tmp.open(&tasks);
        let mut finished = create(&store, "t1");
        let log = Log::new();
        log.stdout().write_all(b"done\n").unwrap();
        finished.complete(0, Utc::now());
        store.finalize_run("t1", &finished, &log).unwrap();

        create(&store, "t1");
        finished
    };

    let store = tmp.open(&tasks);

    let orphan = store.run("t1", RunId(2)).unwrap();
    assert_eq!(orphan.exit_code, Some(ORPHANED_EXIT_CODE));
    assert!(orphan.completed.is_some());
    assert!(store.log("t1", RunId(2)).unwrap().is_empty());

    assert_eq!(store.run("t1", finished.id).unwrap(), finished);
    assert_eq!(store.log("t1", finished.id).unwrap().len(), 1);
    assert_eq!(ids(&store.finished_runs("t1", None, 10).unwrap()), vec![2, 1]);
}
