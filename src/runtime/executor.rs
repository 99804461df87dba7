// src/runtime/executor.rs

//! Plan execution.
//!
//! Top-level tasks run strictly sequentially in declaration order; within
//! one, the parent command and its children share the parallelism cap. A
//! single dispatch loop per top-level task consumes the event channel, and
//! it is the sole mutator of task status and the statistics record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{CachePaths, EtaCache, GlobalOptions, Runbook};
use crate::errors::Result;
use crate::handler::EventHandler;
use crate::types::TaskStatus;

use super::runner::{spawn_runner, RunnerSpec};
use super::task::Task;
use super::{RuntimeContext, TaskEvent};

/// Capacity of the per-task event channel; runners block when it fills.
const EVENT_BUFFER: usize = 500;

/// One entry of the post-run failure report.
#[derive(Debug, Clone)]
pub struct FailureSummary {
    pub name: String,
    pub cmd: String,
    pub return_code: i32,
    pub stderr: String,
    /// Failed with `ignore-failure` set: in the report, but not fatal.
    pub ignored: bool,
}

/// Live counters shared with handlers. Only the dispatch loop writes;
/// handler reads may lag by one event.
#[derive(Debug, Default)]
pub struct TaskStatistics {
    pub total: usize,
    pub running: usize,
    pub completed: Vec<String>,
    pub failed: Vec<FailureSummary>,
}

impl TaskStatistics {
    /// Failures that count toward the exit code.
    pub fn fatal_failures(&self) -> usize {
        self.failed.iter().filter(|failure| !failure.ignored).count()
    }
}

/// Owns the plan, the statistics record, and the ETA cache.
pub struct Executor {
    tasks: Vec<Task>,
    options: GlobalOptions,
    cache_paths: CachePaths,
    context: Arc<RuntimeContext>,
    handlers: Vec<Box<dyn EventHandler>>,
    eta_cache: EtaCache,
    environment: Arc<Mutex<HashMap<String, String>>>,
    statistics: Arc<Mutex<TaskStatistics>>,
    total_eta: Duration,
}

impl Executor {
    pub fn new(runbook: Runbook, cache_paths: CachePaths, context: Arc<RuntimeContext>) -> Self {
        let tasks: Vec<Task> = runbook.tasks.into_iter().map(Task::from_config).collect();

        let mut total = 0;
        for task in &tasks {
            if task.has_command() {
                total += 1;
            }
            total += task.children.iter().filter(|c| c.has_command()).count();
        }

        Self {
            tasks,
            options: runbook.options,
            cache_paths,
            context,
            handlers: Vec::new(),
            eta_cache: EtaCache::default(),
            environment: Arc::new(Mutex::new(HashMap::new())),
            statistics: Arc::new(Mutex::new(TaskStatistics {
                total,
                ..TaskStatistics::default()
            })),
            total_eta: Duration::ZERO,
        }
    }

    /// Attach a handler; it immediately receives the live statistics record.
    pub fn add_event_handler(&mut self, mut handler: Box<dyn EventHandler>) {
        handler.add_runtime_data(Arc::clone(&self.statistics));
        self.handlers.push(handler);
    }

    pub fn statistics(&self) -> Arc<Mutex<TaskStatistics>> {
        Arc::clone(&self.statistics)
    }

    pub fn total_eta(&self) -> Duration {
        self.total_eta
    }

    /// Load the ETA cache and compute the plan-wide estimate. A missing
    /// cache file simply yields no estimates.
    pub fn estimate_runtime(&mut self) -> Result<()> {
        self.eta_cache = EtaCache::load(&self.cache_paths.eta)?;

        let cap = self.options.max_parallel_commands;
        let mut total = Duration::ZERO;
        for task in &mut self.tasks {
            if task.has_command() {
                task.estimated_runtime = self.eta_cache.get(&task.config.cmd);
            }
            for child in &mut task.children {
                if child.has_command() {
                    child.estimated_runtime = self.eta_cache.get(&child.config.cmd);
                }
            }
            total += task.estimate_runtime(cap);
        }
        self.total_eta = total;
        debug!(eta_seconds = total.as_secs_f64(), "estimated plan runtime");
        Ok(())
    }

    /// Execute every top-level task in order, honoring the exit flag between
    /// tasks, then persist the updated ETA cache.
    pub async fn run(&mut self) -> Result<()> {
        while !self.tasks.is_empty() {
            let task = self.tasks.remove(0);
            self.execute(task).await;
            if self.context.exit_requested() {
                info!("exit requested, skipping remaining tasks");
                break;
            }
        }

        for handler in &mut self.handlers {
            handler.close();
        }
        self.eta_cache.save(&self.cache_paths.eta);
        Ok(())
    }

    /// The dispatch loop for one top-level task.
    async fn execute(&mut self, mut task: Task) {
        for handler in &mut self.handlers {
            handler.register(&task);
        }

        let (tx, mut rx) = mpsc::channel::<TaskEvent>(EVENT_BUFFER);
        let mut runners: Vec<JoinHandle<()>> = Vec::new();
        let mut next_child = 0;

        self.start_available(&mut task, &mut next_child, &tx, &mut runners);

        loop {
            let running = {
                let stats = self.statistics.lock().unwrap_or_else(|e| e.into_inner());
                stats.running
            };
            if running == 0 {
                break;
            }
            let Some(event) = rx.recv().await else {
                break;
            };

            if event.complete {
                self.complete_task(&mut task, &event);
                self.start_available(&mut task, &mut next_child, &tx, &mut runners);
            } else if let Some(target) = task.find_mut(event.task_id) {
                target.status = event.status;
            }

            for handler in &mut self.handlers {
                handler.on_event(&task, &event);
            }
        }

        drop(tx);
        for runner in runners {
            let _ = runner.await;
        }

        for handler in &mut self.handlers {
            for child in &task.children {
                handler.unregister(child);
            }
            handler.unregister(&task);
        }
    }

    /// Spawn the parent command and then children, in order, while the
    /// running count is below the cap.
    fn start_available(
        &mut self,
        task: &mut Task,
        next_child: &mut usize,
        tx: &mpsc::Sender<TaskEvent>,
        runners: &mut Vec<JoinHandle<()>>,
    ) {
        let cap = self.options.max_parallel_commands;
        let mut stats = self.statistics.lock().unwrap_or_else(|e| e.into_inner());

        if task.has_command() && !task.started && stats.running < cap {
            let spec = RunnerSpec::from_task(task);
            task.started = true;
            task.started_at = Some(Instant::now());
            stats.running += 1;
            runners.push(spawn_runner(
                spec,
                tx.clone(),
                Some(Arc::clone(&self.environment)),
                Arc::clone(&self.context),
            ));
        }

        while *next_child < task.children.len() && stats.running < cap {
            let child = &mut task.children[*next_child];
            *next_child += 1;
            let spec = RunnerSpec::from_task(child);
            child.started = true;
            child.started_at = Some(Instant::now());
            stats.running += 1;
            runners.push(spawn_runner(
                spec,
                tx.clone(),
                None,
                Arc::clone(&self.context),
            ));
        }
    }

    /// Record a completion event: status, timing, statistics, ETA cache.
    fn complete_task(&mut self, task: &mut Task, event: &TaskEvent) {
        let is_child = event.task_id != task.id;
        let Some(target) = task.find_mut(event.task_id) else {
            return;
        };

        target.completed = true;
        target.status = event.status;
        target.return_code = event.return_code;

        let name = target.display_name();
        let cmd = target.config.cmd.clone();
        let ignored = target.config.ignore_failure;
        let stderr = target
            .error_buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let elapsed = target.started_at.map(|at| at.elapsed());

        if let Some(elapsed) = elapsed {
            self.eta_cache.set(&cmd, elapsed);
        }

        if is_child && event.status == TaskStatus::Error {
            task.failed_children += 1;
        }

        let mut stats = self.statistics.lock().unwrap_or_else(|e| e.into_inner());
        stats.running = stats.running.saturating_sub(1);
        stats.completed.push(name.clone());
        if event.return_code != 0 {
            stats.failed.push(FailureSummary {
                name,
                cmd,
                return_code: event.return_code,
                stderr,
                ignored,
            });
        }
    }
}
