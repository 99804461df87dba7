// tests/executor_events.rs

mod common;
use crate::common::{init_tracing, recording_executor, with_timeout};

use shrun::types::TaskStatus;
use shrun_test_utils::builders::{RunbookBuilder, TaskConfigBuilder};
use shrun_test_utils::recording::{events_for, Observation};

#[tokio::test]
async fn successful_leaf_emits_running_then_success() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("true").name("ok").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run succeeds");

    let log = log.lock().unwrap();
    let events = events_for(&log, "ok");
    assert!(!events.is_empty());

    match &events[0] {
        Observation::Event {
            status,
            complete,
            return_code,
            stdout,
            stderr,
            ..
        } => {
            assert_eq!(*status, TaskStatus::Running);
            assert!(!complete);
            assert_eq!(*return_code, -1);
            assert!(stdout.is_none() && stderr.is_none());
        }
        other => panic!("expected event, got {:?}", other),
    }

    match events.last().expect("terminal event") {
        Observation::Event {
            status,
            complete,
            return_code,
            ..
        } => {
            assert_eq!(*status, TaskStatus::Success);
            assert!(complete);
            assert_eq!(*return_code, 0);
        }
        other => panic!("expected event, got {:?}", other),
    }

    // completion is the final event before unregistration
    let complete_idx = log
        .iter()
        .position(|obs| obs.is_complete_for("ok"))
        .expect("completion observed");
    let unregister_idx = log
        .iter()
        .position(|obs| *obs == Observation::Unregistered("ok".to_string()))
        .expect("unregistration observed");
    assert!(complete_idx < unregister_idx);
}

#[tokio::test]
async fn failing_leaf_emits_error_with_true_return_code() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("false").name("bad").build())
        .build();
    let (mut executor, log, context, _dir) = recording_executor(runbook);
    let statistics = executor.statistics();

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    match events_for(&log, "bad").last().expect("terminal event") {
        Observation::Event {
            status,
            complete,
            return_code,
            ..
        } => {
            assert_eq!(*status, TaskStatus::Error);
            assert!(complete);
            assert_eq!(*return_code, 1);
        }
        other => panic!("expected event, got {:?}", other),
    }

    assert!(context.exit_requested());
    let stats = statistics.lock().unwrap();
    assert_eq!(stats.fatal_failures(), 1);
}

#[tokio::test]
async fn ignore_failure_reports_success_but_logs_the_failure() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(
            TaskConfigBuilder::new("false")
                .name("tolerated")
                .ignore_failure(true)
                .build(),
        )
        .build();
    let (mut executor, log, context, _dir) = recording_executor(runbook);
    let statistics = executor.statistics();

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    match events_for(&log, "tolerated").last().expect("terminal event") {
        Observation::Event {
            status,
            complete,
            return_code,
            ..
        } => {
            assert_eq!(*status, TaskStatus::Success);
            assert!(complete);
            assert_eq!(*return_code, 1);
        }
        other => panic!("expected event, got {:?}", other),
    }

    assert!(!context.exit_requested());
    let stats = statistics.lock().unwrap();
    assert_eq!(stats.failed.len(), 1, "still in the failure report");
    assert!(stats.failed[0].ignored);
    assert_eq!(stats.fatal_failures(), 0);
}

#[tokio::test]
async fn stop_on_failure_prevents_later_tasks_from_running() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("false").name("first").build())
        .task(TaskConfigBuilder::new("echo second").name("second").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    assert!(events_for(&log, "second").is_empty());
    assert!(!log.contains(&Observation::Registered("second".to_string())));
}

#[tokio::test]
async fn without_stop_on_failure_later_tasks_still_run() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .stop_on_failure(false)
        .task(
            TaskConfigBuilder::new("false")
                .name("first")
                .stop_on_failure(false)
                .build(),
        )
        .task(TaskConfigBuilder::new("true").name("second").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);
    let statistics = executor.statistics();

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    match events_for(&log, "second").last().expect("second ran") {
        Observation::Event {
            status, complete, ..
        } => {
            assert_eq!(*status, TaskStatus::Success);
            assert!(complete);
        }
        other => panic!("expected event, got {:?}", other),
    }

    let stats = statistics.lock().unwrap();
    assert_eq!(stats.fatal_failures(), 1);
    assert_eq!(stats.completed.len(), 2);
}

#[tokio::test]
async fn parallelism_cap_delays_the_third_child() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .max_parallel(2)
        .task(
            TaskConfigBuilder::new("")
                .name("group")
                .child(TaskConfigBuilder::new("sleep 0.3").name("c1").build())
                .child(TaskConfigBuilder::new("sleep 0.3").name("c2").build())
                .child(TaskConfigBuilder::new("sleep 0.3").name("c3").build())
                .build(),
        )
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    let c3_running = log
        .iter()
        .position(|obs| {
            matches!(obs, Observation::Event { task, complete: false, .. } if task == "c3")
        })
        .expect("c3 ran");
    let first_complete = log
        .iter()
        .position(|obs| matches!(obs, Observation::Event { complete: true, .. }))
        .expect("a completion observed");
    assert!(
        first_complete < c3_running,
        "third child must start only after a slot frees up"
    );

    // all three eventually complete
    for name in ["c1", "c2", "c3"] {
        assert!(log.iter().any(|obs| obs.is_complete_for(name)), "{}", name);
    }
}

#[tokio::test]
async fn task_runs_in_its_configured_working_directory() {
    init_tracing();

    let workdir = tempfile::TempDir::new().expect("tempdir");
    let expected = std::fs::canonicalize(workdir.path()).expect("canonical path");

    let runbook = RunbookBuilder::new()
        .task(
            TaskConfigBuilder::new("pwd")
                .name("where")
                .cwd(&workdir.path().to_string_lossy())
                .build(),
        )
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    let printed = events_for(&log, "where")
        .iter()
        .find_map(|obs| match obs {
            Observation::Event {
                stdout: Some(line), ..
            } => Some(line.clone()),
            _ => None,
        })
        .expect("pwd produced a line");
    assert_eq!(printed, expected.to_string_lossy());
}

#[tokio::test]
async fn stdout_lines_arrive_as_running_events() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("echo hello").name("greeter").build())
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    let lines: Vec<String> = events_for(&log, "greeter")
        .iter()
        .filter_map(|obs| match obs {
            Observation::Event {
                stdout: Some(line), ..
            } => Some(line.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec!["hello".to_string()]);
}

#[tokio::test]
async fn carriage_returns_split_output_like_newlines() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(
            TaskConfigBuilder::new(r"printf 'a\rb\rc\n'")
                .name("progress")
                .build(),
        )
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    let lines: Vec<String> = events_for(&log, "progress")
        .iter()
        .filter_map(|obs| match obs {
            Observation::Event {
                stdout: Some(line), ..
            } => Some(line.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn stderr_lines_accumulate_in_the_failure_report() {
    init_tracing();

    let runbook = RunbookBuilder::new()
        .task(
            TaskConfigBuilder::new("echo boom >&2; exit 3")
                .name("noisy")
                .stop_on_failure(false)
                .build(),
        )
        .build();
    let (mut executor, log, _context, _dir) = recording_executor(runbook);
    let statistics = executor.statistics();

    with_timeout(executor.run()).await.expect("run finishes");

    let log = log.lock().unwrap();
    let saw_stderr = events_for(&log, "noisy").iter().any(|obs| {
        matches!(obs, Observation::Event { stderr: Some(line), .. } if line == "boom")
    });
    assert!(saw_stderr);

    let stats = statistics.lock().unwrap();
    assert_eq!(stats.failed.len(), 1);
    assert_eq!(stats.failed[0].return_code, 3);
    assert!(stats.failed[0].stderr.contains("boom"));
}
