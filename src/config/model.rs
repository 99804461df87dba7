// src/config/model.rs

//! Raw and resolved run-description types.
//!
//! The YAML document has two top-level keys: `config` (global options) and
//! `tasks`. Tasks are deserialized into [`RawTaskConfig`] and then resolved
//! into [`TaskConfig`] by overlaying the global options, so a flag such as
//! `stop-on-failure` set once in `config` becomes the default for every task
//! that does not override it.

use serde::{Deserialize, Deserializer};

/// Options applied to all tasks or affecting general behavior.
///
/// Deserialization overlays the document's `config` mapping onto
/// [`GlobalOptions::default`], so any omitted key keeps its default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GlobalOptions {
    /// Short string prefixed to displayed task names.
    pub bullet_char: String,

    /// Extra paths to embed when packaging a self-contained bundle.
    pub bundle: Vec<String>,

    /// Roll a group up into a single line once all children finish.
    pub collapse_on_completion: bool,

    pub running_status_color: u16,
    pub pending_status_color: u16,
    pub success_status_color: u16,
    pub error_status_color: u16,

    /// Update observers on every stdout/stderr event rather than polling.
    pub event_driven: bool,

    /// Placeholder replaced with the downloaded asset path in `cmd`.
    pub exec_replace_pattern: String,

    /// Treat every non-zero return code as success.
    pub ignore_failure: bool,

    /// Destination for the run transcript; defaults to `logs/run.log`
    /// under the cache directory.
    pub log_path: Option<String>,

    /// Most commands allowed to run at any one time.
    pub max_parallel_commands: usize,

    /// Placeholder replaced with each `for-each` value.
    pub replica_replace_pattern: String,

    pub show_summary_errors: bool,
    pub show_summary_footer: bool,

    /// Print a detailed report of all failed tasks after execution.
    pub show_failure_report: bool,

    pub show_summary_steps: bool,
    pub show_summary_times: bool,
    pub show_task_times: bool,

    /// Show task stdout/stderr while running.
    pub show_task_output: bool,

    /// Halt further execution when a task returns non-zero.
    pub stop_on_failure: bool,

    /// Compress all output into a single line.
    pub single_line: bool,

    /// Screen refresh period in seconds (only when `event-driven: false`).
    pub update_interval: f64,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            bullet_char: "•".to_string(),
            bundle: Vec::new(),
            collapse_on_completion: false,
            running_status_color: 22,
            pending_status_color: 22,
            success_status_color: 10,
            error_status_color: 160,
            event_driven: true,
            exec_replace_pattern: "<exec>".to_string(),
            ignore_failure: false,
            log_path: None,
            max_parallel_commands: 4,
            replica_replace_pattern: "<replace>".to_string(),
            show_summary_errors: false,
            show_summary_footer: true,
            show_failure_report: true,
            show_summary_steps: true,
            show_summary_times: true,
            show_task_times: false,
            show_task_output: true,
            stop_on_failure: true,
            single_line: false,
            update_interval: -1.0,
        }
    }
}

impl GlobalOptions {
    /// Single-line mode cannot host a footer or collapsed groups.
    pub fn normalize(&mut self) {
        if self.single_line {
            self.show_summary_footer = false;
            self.collapse_on_completion = false;
        }
    }
}

/// A task exactly as written in the document, before defaults are resolved.
///
/// Display flags are `Option` so that "not set" can be distinguished from an
/// explicit `false` when overlaying [`GlobalOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RawTaskConfig {
    pub name: Option<String>,
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub url: Option<String>,
    pub md5: Option<String>,

    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<String>,

    pub for_each: Vec<String>,

    /// Children executed concurrently; may not themselves have children.
    pub parallel_tasks: Vec<RawTaskConfig>,

    pub sudo: bool,
    pub ignore_failure: Option<bool>,
    pub stop_on_failure: Option<bool>,
    pub show_output: Option<bool>,
    pub event_driven: Option<bool>,
    pub collapse_on_completion: Option<bool>,
}

/// A task with every flag resolved against the global options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskConfig {
    /// Display name; when absent the command string stands in at render time.
    pub name: Option<String>,
    pub cmd: String,
    pub cwd: Option<String>,
    pub url: Option<String>,
    pub md5: Option<String>,
    pub tags: Vec<String>,
    pub for_each: Vec<String>,
    pub children: Vec<TaskConfig>,
    pub sudo: bool,
    pub ignore_failure: bool,
    pub stop_on_failure: bool,
    pub show_output: bool,
    pub event_driven: bool,
    pub collapse_on_completion: bool,
}

impl RawTaskConfig {
    /// Overlay `options` onto the unset flags.
    pub fn resolve(self, options: &GlobalOptions) -> TaskConfig {
        let mut show_output = self.show_output.unwrap_or(options.show_task_output);
        let mut collapse = self
            .collapse_on_completion
            .unwrap_or(options.collapse_on_completion);
        if options.single_line {
            show_output = false;
            collapse = false;
        }

        TaskConfig {
            name: self.name,
            cmd: self.cmd.unwrap_or_default(),
            cwd: self.cwd,
            url: self.url,
            md5: self.md5,
            tags: self.tags,
            for_each: self.for_each,
            children: self
                .parallel_tasks
                .into_iter()
                .map(|child| child.resolve(options))
                .collect(),
            sudo: self.sudo,
            ignore_failure: self.ignore_failure.unwrap_or(options.ignore_failure),
            stop_on_failure: self.stop_on_failure.unwrap_or(options.stop_on_failure),
            show_output,
            event_driven: self.event_driven.unwrap_or(options.event_driven),
            collapse_on_completion: collapse,
        }
    }
}

/// The document as parsed, before compilation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawRunbook {
    pub config: GlobalOptions,
    pub tasks: Vec<RawTaskConfig>,
}

/// Accept `tags: thing` as well as `tags: [thing1, thing2]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
    })
}
