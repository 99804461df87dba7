// src/runtime/task.rs

//! Runtime task tree derived from compiled [`TaskConfig`]s.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::TaskConfig;
use crate::types::TaskStatus;

/// A unit of work: a leaf shell command or a group of concurrent children.
///
/// The executor exclusively owns its top-level tasks; a task exclusively
/// owns its children. All status mutation happens on the dispatch loop.
#[derive(Debug)]
pub struct Task {
    pub id: Uuid,
    pub config: TaskConfig,
    pub children: Vec<Task>,
    pub status: TaskStatus,
    pub started: bool,
    pub completed: bool,
    pub failed_children: usize,

    /// From the ETA cache; `None` when the command has never been timed.
    pub estimated_runtime: Option<Duration>,

    /// Stamped by the dispatch loop when the runner is spawned.
    pub started_at: Option<Instant>,

    /// `-1` until the process has exited.
    pub return_code: i32,

    /// Accumulated stderr, for the post-run failure report.
    pub error_buffer: Arc<Mutex<String>>,

    /// Last-seen output line, read by polling observers when the task is
    /// not event-driven.
    pub current_line: Arc<Mutex<String>>,
}

impl Task {
    pub fn from_config(config: TaskConfig) -> Self {
        let children = config
            .children
            .iter()
            .cloned()
            .map(Task::from_config)
            .collect();
        Self {
            id: Uuid::new_v4(),
            config,
            children,
            status: TaskStatus::Pending,
            started: false,
            completed: false,
            failed_children: 0,
            estimated_runtime: None,
            started_at: None,
            return_code: -1,
            error_buffer: Arc::new(Mutex::new(String::new())),
            current_line: Arc::new(Mutex::new(String::new())),
        }
    }

    /// The name shown to observers: the declared name, else the command
    /// string truncated to 25 characters.
    pub fn display_name(&self) -> String {
        match &self.config.name {
            Some(name) => name.clone(),
            None => {
                if self.config.cmd.chars().count() > 25 {
                    let head: String = self.config.cmd.chars().take(22).collect();
                    format!("{}...", head)
                } else {
                    self.config.cmd.clone()
                }
            }
        }
    }

    /// Whether this task has a command of its own to run.
    pub fn has_command(&self) -> bool {
        !self.config.cmd.is_empty()
    }

    /// Find this task or one of its children by id.
    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find(|child| child.id == id)
    }

    pub fn find(&self, id: Uuid) -> Option<&Task> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find(|child| child.id == id)
    }

    /// Expected wall-clock time for this task: its own command's cached
    /// duration plus the scheduling-aware span of its children.
    ///
    /// Children are simulated against a work queue of `cap` slots: each
    /// child with a known duration starts at the earliest end time once the
    /// queue is full, and the span is the largest end time observed.
    pub fn estimate_runtime(&self, cap: usize) -> Duration {
        let mut total = Duration::ZERO;
        if self.has_command() {
            if let Some(eta) = self.estimated_runtime {
                total += eta;
            }
        }

        let mut span = Duration::ZERO;
        let mut end_times: Vec<Duration> = Vec::new();
        let mut current = Duration::ZERO;
        let mut free_slots = cap;

        for child in &self.children {
            let Some(eta) = child.estimated_runtime.filter(|_| child.has_command()) else {
                continue;
            };
            if free_slots == 0 {
                // all slots busy: the next child starts when the earliest
                // running one ends
                let earliest = end_times
                    .iter()
                    .copied()
                    .min()
                    .unwrap_or(Duration::ZERO);
                if let Some(index) = end_times.iter().position(|end| *end == earliest) {
                    end_times.remove(index);
                }
                current = earliest;
                free_slots += 1;
            }
            end_times.push(current + eta);
            free_slots -= 1;
            let latest = end_times.iter().copied().max().unwrap_or(Duration::ZERO);
            span = span.max(latest);
        }

        total + span
    }
}
