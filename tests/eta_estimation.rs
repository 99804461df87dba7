// tests/eta_estimation.rs

mod common;
use crate::common::init_tracing;

use std::time::Duration;

use tempfile::TempDir;

use shrun::config::{CachePaths, EtaCache};
use shrun::runtime::Task;
use shrun_test_utils::builders::{RunbookBuilder, TaskConfigBuilder};

fn group_with_child_etas(etas_seconds: &[u64]) -> Task {
    let mut builder = TaskConfigBuilder::new("").name("group");
    for (index, _) in etas_seconds.iter().enumerate() {
        builder = builder.child(TaskConfigBuilder::new(&format!("cmd-{}", index)).build());
    }
    let mut task = Task::from_config(builder.build());
    for (child, seconds) in task.children.iter_mut().zip(etas_seconds) {
        child.estimated_runtime = Some(Duration::from_secs(*seconds));
    }
    task
}

#[test]
fn single_task_eta_is_its_own_duration() {
    init_tracing();

    let mut task = Task::from_config(TaskConfigBuilder::new("make all").build());
    task.estimated_runtime = Some(Duration::from_secs(20));

    assert_eq!(task.estimate_runtime(4), Duration::from_secs(20));
}

#[test]
fn parallel_children_within_cap_take_the_longest_eta() {
    init_tracing();

    let task = group_with_child_etas(&[20, 30, 40]);
    assert_eq!(task.estimate_runtime(4), Duration::from_secs(40));
}

#[test]
fn parallel_children_beyond_cap_queue_on_earliest_end() {
    init_tracing();

    // cap 2: [20, 30] start together, 40 starts when 20 ends, ends at 60
    let task = group_with_child_etas(&[20, 30, 40]);
    assert_eq!(task.estimate_runtime(2), Duration::from_secs(60));
}

#[test]
fn parent_command_duration_adds_to_child_span() {
    init_tracing();

    let mut task = group_with_child_etas(&[10, 10]);
    task.config.cmd = "setup".to_string();
    task.estimated_runtime = Some(Duration::from_secs(5));

    assert_eq!(task.estimate_runtime(4), Duration::from_secs(15));
}

#[test]
fn children_without_cached_eta_are_skipped() {
    init_tracing();

    let mut task = group_with_child_etas(&[20, 30]);
    task.children[1].estimated_runtime = None;

    assert_eq!(task.estimate_runtime(4), Duration::from_secs(20));
}

#[test]
fn eta_cache_round_trips_through_disk() {
    init_tracing();

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("eta");

    let mut cache = EtaCache::default();
    cache.set("sleep 20", Duration::from_secs(20));
    cache.save(&path);

    let loaded = EtaCache::load(&path).expect("loads");
    assert_eq!(loaded.get("sleep 20"), Some(Duration::from_secs(20)));
}

#[test]
fn missing_cache_file_yields_empty_cache() {
    init_tracing();

    let dir = TempDir::new().expect("tempdir");
    let loaded = EtaCache::load(&dir.path().join("eta")).expect("loads");
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn executor_estimates_plan_from_persisted_cache() {
    init_tracing();

    let dir = TempDir::new().expect("tempdir");
    let cache_paths = CachePaths::new(dir.path());
    cache_paths.ensure().expect("cache dirs");

    let mut cache = EtaCache::default();
    cache.set("build the world", Duration::from_secs(20));
    cache.save(&cache_paths.eta);

    let runbook = RunbookBuilder::new()
        .task(TaskConfigBuilder::new("build the world").build())
        .build();

    let context = std::sync::Arc::new(shrun::runtime::RuntimeContext::new(None));
    let mut executor = shrun::runtime::Executor::new(runbook, cache_paths, context);
    executor.estimate_runtime().expect("estimates");

    assert_eq!(executor.total_eta(), Duration::from_secs(20));
}
