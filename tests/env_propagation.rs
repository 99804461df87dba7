// tests/env_propagation.rs

mod common;
use crate::common::{init_tracing, recording_executor, with_timeout};

use shrun_test_utils::builders::{RunbookBuilder, TaskConfigBuilder};
use shrun_test_utils::recording::{events_for, Observation};

fn stdout_lines(log: &[Observation], name: &str) -> Vec<String> {
    events_for(log, name)
        .iter()
        .filter_map(|obs| match obs {
            Observation::Event {
                stdout: Some(line), ..
            } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn exported_variables_reach_later_serial_tasks() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("export SETTING=42").name("setter").build())
        .task(TaskConfigBuilder::new("echo $SETTING").name("reader").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    assert_eq!(stdout_lines(&log, "reader"), vec!["42".to_string()]);
}

#[tokio::test]
async fn later_exports_overwrite_earlier_values() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("export SETTING=first").name("one").build())
        .task(TaskConfigBuilder::new("export SETTING=second").name("two").build())
        .task(TaskConfigBuilder::new("echo $SETTING").name("reader").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    assert_eq!(stdout_lines(&log, "reader"), vec!["second".to_string()]);
}

#[tokio::test]
async fn parallel_children_do_not_leak_their_environment() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(
            TaskConfigBuilder::new("")
                .name("group")
                .child(TaskConfigBuilder::new("export LEAK=yes").name("child").build())
                .build(),
        )
        .task(
            TaskConfigBuilder::new("echo ${LEAK:-unset}")
                .name("reader")
                .build(),
        )
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    assert_eq!(stdout_lines(&log, "reader"), vec!["unset".to_string()]);
}
