//! Scheduler integration tests running real stub backend processes.
#![cfg(unix)]

mod common;

use agentx_cli::config::TestConfigBuilder;
use agentx_cli::core::batch;
use agentx_cli::core::parallel::{TaskScheduler, TaskState};
use agentx_cli::core::runner::ProcessExecutor;
use common::{batch_input, echo_message_script, sleeping_script, stub_backend};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn scheduler_with_stub(
    tmp: &TempDir,
    script_body: &str,
    workers: usize,
    fail_fast: bool,
) -> TaskScheduler {
    let exe = stub_backend(tmp.path(), "stub-codex", script_body);
    let config = TestConfigBuilder::new()
        .with_backend_executable("codex", &exe)
        .with_timeout_ms(30_000)
        .build_config();
    let executor = Arc::new(ProcessExecutor::new(config, tmp.path().join("logs")));
    TaskScheduler::new(executor, workers, fail_fast)
}

fn batch_tasks(tmp: &TempDir, blocks: &[(&str, &str)]) -> Vec<agentx_cli::core::parallel::Task> {
    let input = batch_input(blocks);
    let mut tasks = batch::parse(&input).unwrap();
    for task in &mut tasks {
        // keep stub tasks inside the test sandbox and out of skill
        // auto-detection
        task.workdir = Some(tmp.path().to_path_buf());
        task.skills = Some(Vec::new());
    }
    tasks
}

#[tokio::test]
async fn test_dependency_failure_skips_dependents() {
    let tmp = TempDir::new().unwrap();
    // the prompt arrives as the final argv element, so the stub can fail
    // selectively for task A without any extra plumbing
    let script = r#"case "$*" in
  *fail-me*) exit 2 ;;
esac
echo '{"type":"agent_message","text":"ok","final":true}'"#;
    let scheduler = scheduler_with_stub(&tmp, script, 4, false);

    let tasks = batch_tasks(
        &tmp,
        &[
            ("id: A", "fail-me"),
            ("id: B\ndependencies: A", "second"),
            ("id: C\ndependencies: B", "third"),
        ],
    );
    let report = scheduler.run(tasks, CancellationToken::new()).await.unwrap();

    assert_eq!(report.results[0].state, TaskState::Failed);
    assert_eq!(report.results[0].exit_code, Some(2));
    assert_eq!(report.results[1].state, TaskState::Skipped);
    assert_eq!(report.results[1].error.as_deref(), Some("dependency-failed"));
    assert_eq!(report.results[2].state, TaskState::Skipped);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_parallel_independence_wall_clock() {
    let tmp = TempDir::new().unwrap();
    let scheduler = scheduler_with_stub(&tmp, &sleeping_script("0.1", "done"), 3, false);
    let tasks = batch_tasks(
        &tmp,
        &[("id: A", "a"), ("id: B", "b"), ("id: C", "c")],
    );
    let started = Instant::now();
    let report = scheduler.run(tasks, CancellationToken::new()).await.unwrap();
    let parallel_elapsed = started.elapsed();
    assert_eq!(report.succeeded, 3);

    let tmp2 = TempDir::new().unwrap();
    let scheduler = scheduler_with_stub(&tmp2, &sleeping_script("0.1", "done"), 1, false);
    let tasks = batch_tasks(
        &tmp2,
        &[("id: A", "a"), ("id: B", "b"), ("id: C", "c")],
    );
    let started = Instant::now();
    let report = scheduler.run(tasks, CancellationToken::new()).await.unwrap();
    let serial_elapsed = started.elapsed();
    assert_eq!(report.succeeded, 3);

    assert!(
        serial_elapsed > Duration::from_millis(300),
        "serial run finished suspiciously fast: {:?}",
        serial_elapsed
    );
    assert!(
        parallel_elapsed < serial_elapsed,
        "parallel {:?} not faster than serial {:?}",
        parallel_elapsed,
        serial_elapsed
    );
}

#[tokio::test]
async fn test_timeout_task_reports_124() {
    let tmp = TempDir::new().unwrap();
    let exe = stub_backend(tmp.path(), "stub-codex", "sleep 2");
    let config = TestConfigBuilder::new()
        .with_backend_executable("codex", &exe)
        .with_timeout_ms(500)
        .build_config();
    let executor = Arc::new(ProcessExecutor::new(config, tmp.path().join("logs")));
    let scheduler = TaskScheduler::new(executor, 1, false);

    let tasks = batch_tasks(&tmp, &[("id: slow", "body")]);
    let started = Instant::now();
    let report = scheduler.run(tasks, CancellationToken::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.results[0].state, TaskState::TimedOut);
    assert_eq!(report.results[0].exit_code, Some(124));
    assert_eq!(report.exit_code(), 124);
    // the timeout plus at most the SIGTERM grace window
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_secs(8), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_cycle_rejected_without_launch() {
    let tmp = TempDir::new().unwrap();
    let scheduler = scheduler_with_stub(&tmp, &echo_message_script("hi"), 4, false);
    let tasks = batch_tasks(
        &tmp,
        &[
            ("id: A\ndependencies: B", "a"),
            ("id: B\ndependencies: A", "b"),
        ],
    );
    let err = scheduler
        .run(tasks, CancellationToken::new())
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("cycle detected:"));
    assert!(msg.contains('A') && msg.contains('B'));
    // no task directories were created: nothing launched
    assert!(!tmp.path().join("logs").join("A").exists());
    assert!(!tmp.path().join("logs").join("B").exists());
}

#[tokio::test]
async fn test_diamond_dependency_order() {
    let tmp = TempDir::new().unwrap();
    let scheduler = scheduler_with_stub(&tmp, &echo_message_script("ok"), 4, false);
    let tasks = batch_tasks(
        &tmp,
        &[
            ("id: root", "r"),
            ("id: left\ndependencies: root", "l"),
            ("id: right\ndependencies: root", "r2"),
            ("id: merge\ndependencies: left, right", "m"),
        ],
    );
    let report = scheduler.run(tasks, CancellationToken::new()).await.unwrap();
    assert_eq!(report.succeeded, 4);
    let ids: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.task_id.as_str())
        .collect();
    assert_eq!(ids, vec!["root", "left", "right", "merge"]);
}
