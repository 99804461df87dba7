// src/handler/mod.rs

//! Pluggable observers of task lifecycle events.
//!
//! Handlers are invoked synchronously from the executor's dispatch loop, so
//! per-task event order is guaranteed. A slow handler stalls execution;
//! handlers must be cheap or buffer internally, and they absorb their own
//! errors.

use std::sync::{Arc, Mutex};

use crate::runtime::{Task, TaskEvent, TaskStatistics};

pub mod task_logger;

pub use task_logger::TaskLogger;

pub trait EventHandler: Send {
    /// A top-level task (with its children) is about to execute.
    fn register(&mut self, task: &Task);

    /// The task has finished and no further events for it will arrive.
    fn unregister(&mut self, task: &Task);

    /// An event observed on the dispatch loop. `task` is the owning
    /// top-level task; the event's `task_id` may name one of its children.
    fn on_event(&mut self, task: &Task, event: &TaskEvent);

    /// The run is over; flush and release resources.
    fn close(&mut self);

    /// Called once at attach time with the live statistics record.
    fn add_runtime_data(&mut self, statistics: Arc<Mutex<TaskStatistics>>);
}
