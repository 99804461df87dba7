#![allow(dead_code)]

use shrun::config::{GlobalOptions, Runbook, TaskConfig};

/// Builder for a resolved `TaskConfig` to simplify test setup.
///
/// Defaults mirror a freshly parsed task under default global options:
/// event-driven, stop-on-failure, output shown.
pub struct TaskConfigBuilder {
    config: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            config: TaskConfig {
                cmd: cmd.to_string(),
                event_driven: true,
                stop_on_failure: true,
                show_output: true,
                ..TaskConfig::default()
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = Some(name.to_string());
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.config.cwd = Some(cwd.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.config.url = Some(url.to_string());
        self
    }

    pub fn md5(mut self, digest: &str) -> Self {
        self.config.md5 = Some(digest.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.config.tags.push(tag.to_string());
        self
    }

    pub fn child(mut self, child: TaskConfig) -> Self {
        self.config.children.push(child);
        self
    }

    pub fn sudo(mut self) -> Self {
        self.config.sudo = true;
        self
    }

    pub fn ignore_failure(mut self, value: bool) -> Self {
        self.config.ignore_failure = value;
        self
    }

    pub fn stop_on_failure(mut self, value: bool) -> Self {
        self.config.stop_on_failure = value;
        self
    }

    pub fn event_driven(mut self, value: bool) -> Self {
        self.config.event_driven = value;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.config
    }
}

/// Builder for a `Runbook` (compiled plan) without going through YAML.
pub struct RunbookBuilder {
    options: GlobalOptions,
    tasks: Vec<TaskConfig>,
}

impl RunbookBuilder {
    pub fn new() -> Self {
        Self {
            options: GlobalOptions::default(),
            tasks: Vec::new(),
        }
    }

    pub fn max_parallel(mut self, cap: usize) -> Self {
        self.options.max_parallel_commands = cap;
        self
    }

    pub fn stop_on_failure(mut self, value: bool) -> Self {
        self.options.stop_on_failure = value;
        self
    }

    pub fn exec_pattern(mut self, pattern: &str) -> Self {
        self.options.exec_replace_pattern = pattern.to_string();
        self
    }

    pub fn task(mut self, task: TaskConfig) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn build(self) -> Runbook {
        Runbook {
            options: self.options,
            tasks: self.tasks,
        }
    }
}

impl Default for RunbookBuilder {
    fn default() -> Self {
        Self::new()
    }
}
