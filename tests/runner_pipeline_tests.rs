//! End-to-end pipeline tests for the single-task executor.
#![cfg(unix)]

mod common;

use agentx_cli::config::TestConfigBuilder;
use agentx_cli::core::parallel::{Task, TaskExecutor, TaskState};
use agentx_cli::core::runner::ProcessExecutor;
use common::{echo_message_script, stub_backend};
use tempfile::TempDir;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

fn sandbox_task(tmp: &TempDir, id: &str, prompt: &str) -> Task {
    Task {
        workdir: Some(tmp.path().to_path_buf()),
        skills: Some(Vec::new()),
        ..Task::new(id, prompt)
    }
}

/// A stub that replays the delivery channel: argv when the prompt came as
/// an argument, stdin contents otherwise.
const CHANNEL_PROBE: &str = r#"last=""
for arg in "$@"; do last="$arg"; done
if [ "$last" = "-" ]; then
  body=$(cat)
  printf '{"type":"agent_message","text":"stdin:%s","final":true}\n' "$(printf '%s' "$body" | head -c 20 | tr -d '\n"\\')"
else
  printf '{"type":"agent_message","text":"argv:%s","final":true}\n' "$(printf '%s' "$last" | head -c 20)"
fi"#;

fn executor_with_script(tmp: &TempDir, script_body: &str) -> ProcessExecutor {
    let exe = stub_backend(tmp.path(), "stub-codex", script_body);
    let config = TestConfigBuilder::new()
        .with_backend_executable("codex", &exe)
        .with_timeout_ms(10_000)
        .build_config();
    ProcessExecutor::new(config, tmp.path().join("logs"))
}

#[tokio::test]
async fn test_trivial_success_scenario() {
    let tmp = TempDir::new().unwrap();
    let executor = executor_with_script(&tmp, &echo_message_script("hi"));
    let result = executor
        .execute(sandbox_task(&tmp, "T1", "hello"), CancellationToken::new())
        .await;
    assert_eq!(result.state, TaskState::Succeeded);
    assert_eq!(result.agent_message, "hi");
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn test_plain_prompt_travels_via_argv() {
    let tmp = TempDir::new().unwrap();
    let executor = executor_with_script(&tmp, CHANNEL_PROBE);
    let result = executor
        .execute(
            sandbox_task(&tmp, "t", "plain prompt"),
            CancellationToken::new(),
        )
        .await;
    assert!(
        result.agent_message.starts_with("argv:"),
        "got: {}",
        result.agent_message
    );
}

#[tokio::test]
async fn test_special_characters_travel_via_stdin() {
    let tmp = TempDir::new().unwrap();
    for prompt in ["has 'quote'", "has $dollar", "line\nbreak"] {
        let executor = executor_with_script(&tmp, CHANNEL_PROBE);
        let result = executor
            .execute(sandbox_task(&tmp, "t", prompt), CancellationToken::new())
            .await;
        assert!(
            result.agent_message.starts_with("stdin:"),
            "prompt {:?} went via {}",
            prompt,
            result.agent_message
        );
    }
}

#[tokio::test]
async fn test_forced_stdin_flag() {
    let tmp = TempDir::new().unwrap();
    let executor = executor_with_script(&tmp, CHANNEL_PROBE);
    let task = Task {
        force_stdin: true,
        ..sandbox_task(&tmp, "t", "plain")
    };
    let result = executor.execute(task, CancellationToken::new()).await;
    assert!(result.agent_message.starts_with("stdin:"));
}

#[tokio::test]
async fn test_session_id_surfaces_in_result() {
    let tmp = TempDir::new().unwrap();
    let executor = executor_with_script(
        &tmp,
        r#"echo '{"type":"session","session_id":"sess-abc"}'
echo '{"type":"agent_message","text":"done","final":true}'"#,
    );
    let result = executor
        .execute(sandbox_task(&tmp, "t", "hello"), CancellationToken::new())
        .await;
    assert_eq!(result.session_id.as_deref(), Some("sess-abc"));
}

#[tokio::test]
async fn test_log_directory_contains_streams() {
    let tmp = TempDir::new().unwrap();
    let executor = executor_with_script(
        &tmp,
        r#"echo '{"type":"agent_message","text":"logged","final":true}'
echo "diagnostic" >&2"#,
    );
    let result = executor
        .execute(sandbox_task(&tmp, "t", "hello"), CancellationToken::new())
        .await;
    let log_dir = result.log_dir.unwrap();
    assert!(log_dir.join("meta.json").is_file());
    assert!(log_dir.join("stdout.log").is_file());
    assert!(log_dir.join("events.jsonl").is_file());
    assert!(log_dir.join("result.json").is_file());
    let stderr = std::fs::read_to_string(log_dir.join("stderr.log")).unwrap();
    assert!(stderr.contains("diagnostic"));
}

#[tokio::test]
async fn test_external_worktree_reused_and_flag_is_noop() {
    let tmp = TempDir::new().unwrap();

    // a real repository to host the externally-provisioned tree
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    for args in [
        vec!["init", "--initial-branch=main"],
        vec!["config", "user.email", "t@example.com"],
        vec!["config", "user.name", "T"],
    ] {
        let out = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(&args)
            .output()
            .await
            .unwrap();
        assert!(out.status.success());
    }
    std::fs::write(repo.join("seed.txt"), "seed").unwrap();
    for args in [vec!["add", "."], vec!["commit", "-m", "seed"]] {
        let out = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(&args)
            .output()
            .await
            .unwrap();
        assert!(out.status.success());
    }

    // the stub prints its working directory as the agent message
    let exe = stub_backend(
        tmp.path(),
        "stub-codex",
        r#"printf '{"type":"agent_message","text":"%s","final":true}\n' "$(pwd)""#,
    );
    let config = TestConfigBuilder::new()
        .with_backend_executable("codex", &exe)
        .build_config();
    let executor = ProcessExecutor::new(config, tmp.path().join("logs"))
        .with_external_worktree(Some(repo.clone()));

    let task = Task {
        worktree: true, // must be a no-op given the external tree
        ..sandbox_task(&tmp, "wt", "where am I")
    };
    let result = executor.execute(task, CancellationToken::new()).await;
    assert_eq!(result.state, TaskState::Succeeded);
    let reported = std::fs::canonicalize(&repo).unwrap();
    assert!(
        result.agent_message.contains(&reported.display().to_string()),
        "expected cwd {} in {}",
        reported.display(),
        result.agent_message
    );
    // no fresh worktree was created alongside
    assert!(!repo.join(".worktrees").exists());
}

#[tokio::test]
async fn test_worktree_mode_provisions_isolated_tree() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    for args in [
        vec!["init", "--initial-branch=main"],
        vec!["config", "user.email", "t@example.com"],
        vec!["config", "user.name", "T"],
    ] {
        let out = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(&args)
            .output()
            .await
            .unwrap();
        assert!(out.status.success());
    }
    std::fs::write(repo.join("seed.txt"), "seed").unwrap();
    for args in [vec!["add", "."], vec!["commit", "-m", "seed"]] {
        let out = Command::new("git")
            .arg("-C")
            .arg(&repo)
            .args(&args)
            .output()
            .await
            .unwrap();
        assert!(out.status.success());
    }

    let exe = stub_backend(
        tmp.path(),
        "stub-codex",
        r#"printf '{"type":"agent_message","text":"%s","final":true}\n' "$(pwd)""#,
    );
    let config = TestConfigBuilder::new()
        .with_backend_executable("codex", &exe)
        .build_config();
    let executor = ProcessExecutor::new(config, tmp.path().join("logs"));

    let task = Task {
        workdir: Some(repo.clone()),
        worktree: true,
        skills: Some(Vec::new()),
        ..Task::new("wt-1", "where am I")
    };
    let result = executor.execute(task, CancellationToken::new()).await;
    assert_eq!(result.state, TaskState::Succeeded);
    assert!(
        result.agent_message.contains("do-wt-1"),
        "expected worktree path in {}",
        result.agent_message
    );
    assert!(repo.join(".worktrees").join("do-wt-1").is_dir());
}
