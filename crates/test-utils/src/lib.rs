pub mod builders;
pub mod manual_executor;

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use optask::exec::Executor;
use optask::model::{RunId, Task};
use optask::service::Service;
use optask::storage::Store;
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};

pub use manual_executor::ManualExecutor;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll until `run_id` is no longer in flight.
pub async fn wait_until_finished<E: Executor>(service: &Service<E>, task_id: &str, run_id: RunId) {
    while service.is_running(task_id, run_id) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A database file inside a temporary directory that lives as long as this
/// value does.
pub struct TempStore {
    dir: TempDir,
}

impl TempStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("optask-testing.db")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Open the store for `tasks`. Can be called again after the previous
    /// handle was dropped to simulate a restart.
    pub fn open(&self, tasks: &[Task]) -> Store {
        Store::open(self.path(), tasks).expect("failed to open store")
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}
