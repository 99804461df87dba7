// src/config/compile.rs

//! Compilation of an assembled document into a runnable plan.
//!
//! Deterministic and single-threaded. Steps run in a fixed order: parse,
//! validate, argument substitution, `for-each` replica expansion, tag
//! inheritance, tag pruning.

use crate::errors::{Result, ShrunError};
use crate::types::TagSelection;

use super::model::{GlobalOptions, RawRunbook, TaskConfig};

/// The compiled plan: final options plus the ordered top-level task list.
#[derive(Debug, Clone)]
pub struct Runbook {
    pub options: GlobalOptions,
    pub tasks: Vec<TaskConfig>,
}

/// Compile an assembled document into a [`Runbook`].
///
/// `args` are the positional CLI arguments for `$1..$N` / `$*` substitution.
pub fn compile(source: &[u8], args: &[String], selection: &TagSelection) -> Result<Runbook> {
    let raw: RawRunbook = serde_yaml::from_slice(source)?;

    let mut options = raw.config;
    options.normalize();

    let mut tasks: Vec<TaskConfig> = raw
        .tasks
        .into_iter()
        .map(|task| task.resolve(&options))
        .collect();

    validate(&tasks)?;

    for task in &mut tasks {
        substitute_arguments(task, args);
        for child in &mut task.children {
            substitute_arguments(child, args);
        }
    }

    expand_replicas(&mut tasks, &options.replica_replace_pattern);
    inherit_tags(&mut tasks);
    prune_tags(&mut tasks, selection);

    Ok(Runbook { options, tasks })
}

fn validate(tasks: &[TaskConfig]) -> Result<()> {
    for task in tasks {
        validate_one(task)?;
        for child in &task.children {
            if !child.children.is_empty() {
                return Err(ShrunError::ConfigError(format!(
                    "Nested parallel tasks are not allowed (name: '{}', cmd: '{}')",
                    child.name.as_deref().unwrap_or(""),
                    child.cmd,
                )));
            }
            validate_one(child)?;
        }
    }
    Ok(())
}

fn validate_one(task: &TaskConfig) -> Result<()> {
    if task.cmd.is_empty() && task.url.is_none() && task.children.is_empty() {
        return Err(ShrunError::ConfigError(format!(
            "Task '{}' misconfigured: one of 'cmd', 'url', or 'parallel-tasks' is required",
            task.name.as_deref().unwrap_or(""),
        )));
    }
    Ok(())
}

/// Replace `$1..$N` and `$*` in the task's command string and name.
fn substitute_arguments(task: &mut TaskConfig, args: &[String]) {
    task.cmd = replace_arguments(&task.cmd, args);
    if let Some(name) = &task.name {
        task.name = Some(replace_arguments(name, args));
    }
}

fn replace_arguments(source: &str, args: &[String]) -> String {
    let mut replaced = source.to_string();
    for (index, arg) in args.iter().enumerate() {
        replaced = replaced.replace(&format!("${}", index + 1), arg);
    }
    replaced.replace("$*", &args.join(" "))
}

/// Replace each task carrying a `for-each` with one replica per value,
/// in place and preserving document order. Applied to the top level and to
/// every children list; replicas never recurse.
fn expand_replicas(tasks: &mut Vec<TaskConfig>, pattern: &str) {
    expand_level(tasks, pattern);
    for task in tasks {
        expand_level(&mut task.children, pattern);
    }
}

fn expand_level(tasks: &mut Vec<TaskConfig>, pattern: &str) {
    let mut index = 0;
    while index < tasks.len() {
        if tasks[index].for_each.is_empty() {
            index += 1;
            continue;
        }
        let template = tasks.remove(index);
        for value in &template.for_each {
            tasks.insert(index, replicate(&template, pattern, value));
            index += 1;
        }
    }
}

fn replicate(template: &TaskConfig, pattern: &str, value: &str) -> TaskConfig {
    let mut replica = template.clone();
    replica.for_each = Vec::new();
    replica.name = replica.name.map(|name| name.replace(pattern, value));
    replica.cmd = replica.cmd.replace(pattern, value);
    replica.url = replica.url.map(|url| url.replace(pattern, value));
    for tag in &mut replica.tags {
        *tag = tag.replace(pattern, value);
    }
    replica
}

/// A child's tag set becomes the union of its own tags and its parent's.
fn inherit_tags(tasks: &mut [TaskConfig]) {
    for task in tasks {
        let parent_tags = task.tags.clone();
        for child in &mut task.children {
            for tag in &parent_tags {
                if !child.tags.contains(tag) {
                    child.tags.push(tag.clone());
                }
            }
        }
    }
}

/// Drop tasks outside the tag selection. Children are removed unless they
/// match; a top-level task is removed when it does not match and has no
/// surviving children.
fn prune_tags(tasks: &mut Vec<TaskConfig>, selection: &TagSelection) {
    if selection.is_empty() {
        return;
    }
    tasks.retain_mut(|task| {
        task.children.retain(|child| selection.matches(&child.tags));
        selection.matches(&task.tags) || !task.children.is_empty()
    });
}
