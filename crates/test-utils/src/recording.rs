use std::sync::{Arc, Mutex};

use shrun::handler::EventHandler;
use shrun::runtime::{Task, TaskEvent, TaskStatistics};
use shrun::types::TaskStatus;

/// One observation made by a [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Registered(String),
    Unregistered(String),
    Event {
        task: String,
        status: TaskStatus,
        stdout: Option<String>,
        stderr: Option<String>,
        complete: bool,
        return_code: i32,
    },
}

impl Observation {
    pub fn is_complete_for(&self, name: &str) -> bool {
        matches!(self, Observation::Event { task, complete: true, .. } if task == name)
    }
}

/// Handler that records every callback, for asserting on event order.
#[derive(Default)]
pub struct RecordingHandler {
    log: Arc<Mutex<Vec<Observation>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the observation log; clone before attaching.
    pub fn log(&self) -> Arc<Mutex<Vec<Observation>>> {
        Arc::clone(&self.log)
    }
}

impl EventHandler for RecordingHandler {
    fn register(&mut self, task: &Task) {
        self.log
            .lock()
            .unwrap()
            .push(Observation::Registered(task.display_name()));
    }

    fn unregister(&mut self, task: &Task) {
        self.log
            .lock()
            .unwrap()
            .push(Observation::Unregistered(task.display_name()));
    }

    fn on_event(&mut self, task: &Task, event: &TaskEvent) {
        let name = task
            .find(event.task_id)
            .map(Task::display_name)
            .unwrap_or_else(|| task.display_name());
        self.log.lock().unwrap().push(Observation::Event {
            task: name,
            status: event.status,
            stdout: event.stdout.clone(),
            stderr: event.stderr.clone(),
            complete: event.complete,
            return_code: event.return_code,
        });
    }

    fn close(&mut self) {}

    fn add_runtime_data(&mut self, _statistics: Arc<Mutex<TaskStatistics>>) {}
}

/// Events observed for a single task name, in order.
pub fn events_for(log: &[Observation], name: &str) -> Vec<Observation> {
    log.iter()
        .filter(|obs| matches!(obs, Observation::Event { task, .. } if task == name))
        .cloned()
        .collect()
}
