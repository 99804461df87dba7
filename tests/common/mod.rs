// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use shrun::config::{CachePaths, Runbook};
use shrun::runtime::{Executor, RuntimeContext};
use shrun_test_utils::recording::{Observation, RecordingHandler};

pub use shrun_test_utils::{init_tracing, with_timeout};

/// Build an executor over `runbook` with a recording handler attached.
///
/// Returns the executor, the shared observation log, the runtime context,
/// and the cache tempdir (kept alive for the duration of the test).
pub fn recording_executor(
    runbook: Runbook,
) -> (
    Executor,
    Arc<Mutex<Vec<Observation>>>,
    Arc<RuntimeContext>,
    TempDir,
) {
    let dir = TempDir::new().expect("tempdir");
    let cache = CachePaths::new(dir.path());
    cache.ensure().expect("cache dirs");

    let context = Arc::new(RuntimeContext::new(None));
    let mut executor = Executor::new(runbook, cache, Arc::clone(&context));

    let handler = RecordingHandler::new();
    let log = handler.log();
    executor.add_event_handler(Box::new(handler));

    (executor, log, context, dir)
}
