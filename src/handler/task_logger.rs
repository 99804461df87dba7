// src/handler/task_logger.rs

//! File-logging event handler.
//!
//! Appends a plain-text transcript of the run to the configured log path:
//! start and completion markers per task plus every streamed output line,
//! prefixed with the task's display name. Write errors are absorbed and
//! reported once through the log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::errors::Result;
use crate::runtime::{Task, TaskEvent, TaskStatistics};

use super::EventHandler;

pub struct TaskLogger {
    writer: BufWriter<File>,
    statistics: Option<Arc<Mutex<TaskStatistics>>>,
    write_failed: bool,
}

impl TaskLogger {
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            statistics: None,
            write_failed: false,
        })
    }

    fn write_line(&mut self, line: &str) {
        if self.write_failed {
            return;
        }
        if writeln!(self.writer, "{}", line).is_err() {
            self.write_failed = true;
            warn!("log file is no longer writable, further entries dropped");
        }
    }
}

impl EventHandler for TaskLogger {
    fn register(&mut self, task: &Task) {
        self.write_line(&format!("Started task: {}", task.display_name()));
    }

    fn unregister(&mut self, task: &Task) {
        self.write_line(&format!(
            "Completed task: {} (rc: {})",
            task.display_name(),
            task.return_code,
        ));
    }

    fn on_event(&mut self, task: &Task, event: &TaskEvent) {
        let name = task
            .find(event.task_id)
            .map(Task::display_name)
            .unwrap_or_else(|| task.display_name());
        if let Some(line) = &event.stdout {
            self.write_line(&format!("{}: {}", name, line));
        }
        if let Some(line) = &event.stderr {
            self.write_line(&format!("{}: [error] {}", name, line));
        }
    }

    fn close(&mut self) {
        if let Some(statistics) = self.statistics.clone() {
            let (completed, total, failed) = {
                let stats = statistics.lock().unwrap_or_else(|e| e.into_inner());
                (stats.completed.len(), stats.total, stats.failed.len())
            };
            self.write_line(&format!(
                "Run complete: {} of {} tasks finished, {} failed",
                completed, total, failed,
            ));
        }
        let _ = self.writer.flush();
    }

    fn add_runtime_data(&mut self, statistics: Arc<Mutex<TaskStatistics>>) {
        self.statistics = Some(statistics);
    }
}
