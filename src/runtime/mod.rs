// src/runtime/mod.rs

//! The execution core: runtime task tree, per-command runners, and the
//! executor that drives them.
//!
//! - [`task`] holds the runtime [`Task`] tree built from compiled configs.
//! - [`runner`] executes one leaf command and streams its output as events.
//! - [`executor`] owns the plan, schedules runners under the parallelism
//!   cap, and fans events out to handlers.

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use crate::types::TaskStatus;

pub mod executor;
pub mod runner;
pub mod task;

pub use executor::{Executor, FailureSummary, TaskStatistics};
pub use runner::RunnerSpec;
pub use task::Task;

/// A single observation from a running command: either a streamed output
/// line or the final completion record.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Exactly one of `stdout` / `stderr` is set for streaming events.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub complete: bool,
    /// `-1` until the process has exited.
    pub return_code: i32,
}

impl TaskEvent {
    pub fn running(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Running,
            stdout: None,
            stderr: None,
            complete: false,
            return_code: -1,
        }
    }

    pub fn stdout(task_id: Uuid, line: String) -> Self {
        Self {
            stdout: Some(line),
            ..Self::running(task_id)
        }
    }

    pub fn stderr(task_id: Uuid, line: String) -> Self {
        Self {
            stderr: Some(line),
            ..Self::running(task_id)
        }
    }

    pub fn completed(task_id: Uuid, status: TaskStatus, return_code: i32) -> Self {
        Self {
            task_id,
            status,
            stdout: None,
            stderr: None,
            complete: true,
            return_code,
        }
    }
}

/// Process-wide state threaded explicitly through the executor and runners.
#[derive(Debug)]
pub struct RuntimeContext {
    exit_requested: AtomicBool,

    /// Captured once before the first sudo task starts; read-only after.
    pub sudo_password: Option<String>,

    /// Used by the line splitter to bound fragment length.
    pub terminal_width: usize,
}

impl RuntimeContext {
    pub fn new(sudo_password: Option<String>) -> Self {
        let terminal_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(80);
        Self {
            exit_requested: AtomicBool::new(false),
            sudo_password,
            terminal_width,
        }
    }

    /// Ask the executor to stop before the next top-level task.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::SeqCst);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new(None)
    }
}
