// src/types.rs

use crate::config::GlobalOptions;

/// Lifecycle state of a task command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting to be started.
    Pending,
    /// Currently executing (also used for streamed output events).
    Running,
    /// Exited with rc 0, or non-zero with `ignore-failure` set.
    Success,
    /// Exited non-zero.
    Error,
}

/// 256-palette color for a status, as configured in the global options.
///
/// Kept outside the runtime core; only display handlers care about colors.
pub fn status_color(status: TaskStatus, options: &GlobalOptions) -> u16 {
    match status {
        TaskStatus::Pending => options.pending_status_color,
        TaskStatus::Running => options.running_status_color,
        TaskStatus::Success => options.success_status_color,
        TaskStatus::Error => options.error_status_color,
    }
}

/// Which tasks to run, from the `--tags` / `--only-tags` flags.
///
/// An empty `tags` list means no filtering at all.
#[derive(Debug, Clone, Default)]
pub struct TagSelection {
    pub tags: Vec<String>,

    /// With `false` (the `--tags` flag), untagged tasks always match.
    /// With `true` (the `--only-tags` flag), untagged tasks never match.
    pub only_tagged: bool,
}

impl TagSelection {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether a task carrying `tags` survives this selection.
    pub fn matches(&self, tags: &[String]) -> bool {
        if tags.is_empty() {
            return !self.only_tagged;
        }
        tags.iter().any(|tag| self.tags.contains(tag))
    }
}
