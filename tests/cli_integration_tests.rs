//! Full-binary CLI tests driven through `assert_cmd`.
#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::{batch_input, echo_message_script, stub_backend};
use predicates::prelude::*;
use tempfile::TempDir;

/// Write a config file routing the codex backend at a stub executable and
/// return the config path.
fn stub_config(tmp: &TempDir, script_body: &str) -> String {
    let exe = stub_backend(tmp.path(), "stub-codex", script_body);
    let config_path = tmp.path().join("config.json");
    std::fs::write(
        &config_path,
        format!(r#"{{"backends": {{"codex": {{"executable": "{}"}}}}}}"#, exe),
    )
    .unwrap();
    config_path.display().to_string()
}

fn agentx(tmp: &TempDir, config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("agentx").unwrap();
    cmd.current_dir(tmp.path())
        .env("AGENTX_CONFIG_PATH", config_path)
        .env("AGENTX_TMPDIR", tmp.path().join("logs"));
    cmd
}

#[test]
fn test_help_lists_core_flags() {
    Command::cargo_bin("agentx")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--backend"))
        .stdout(predicate::str::contains("--parallel"))
        .stdout(predicate::str::contains("--skip-permissions"))
        .stdout(predicate::str::contains("--worktree"));
}

#[test]
fn test_missing_task_fails_with_hint() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 0");
    agentx(&tmp, &config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing task description"));
}

#[test]
fn test_parallel_rejects_positional_argument() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 0");
    agentx(&tmp, &config)
        .arg("--parallel")
        .arg("stray")
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no positional arguments"));
}

#[test]
fn test_unknown_backend_value_rejected_by_clap() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 0");
    agentx(&tmp, &config)
        .args(["--backend", "cursor", "task"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cursor"));
}

#[test]
fn test_single_task_success_prints_message_and_session() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(
        &tmp,
        r#"echo '{"type":"session","session_id":"s-77"}'
echo '{"type":"agent_message","text":"all done","final":true}'"#,
    );
    agentx(&tmp, &config)
        .arg("do the thing")
        .assert()
        .success()
        .stdout(predicate::str::contains("all done"))
        .stdout(predicate::str::contains("SESSION_ID: s-77"));
}

#[test]
fn test_single_task_exit_code_passthrough() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 3");
    agentx(&tmp, &config).arg("boom").assert().code(3);
}

#[test]
fn test_single_task_timeout_exits_124() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "sleep 5");
    agentx(&tmp, &config)
        .env("AGENTX_TIMEOUT", "300")
        .arg("slow")
        .assert()
        .code(124);
}

#[test]
fn test_dash_reads_prompt_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, &echo_message_script("read it"));
    agentx(&tmp, &config)
        .arg("-")
        .write_stdin("prompt from a pipe\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("read it"));
}

#[test]
fn test_parallel_batch_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, &echo_message_script("ok"));
    let batch = batch_input(&[
        ("id: first", "one"),
        ("id: second\ndependencies: first", "two"),
    ]);
    agentx(&tmp, &config)
        .arg("--parallel")
        .write_stdin(batch)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 total"))
        .stdout(predicate::str::contains("succeeded"));
}

#[test]
fn test_parallel_batch_failure_exit_code() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 2");
    let batch = batch_input(&[("id: only", "body")]);
    agentx(&tmp, &config)
        .arg("--parallel")
        .write_stdin(batch)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_parallel_cycle_is_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, &echo_message_script("ok"));
    let batch = batch_input(&[
        ("id: a\ndependencies: b", "one"),
        ("id: b\ndependencies: a", "two"),
    ]);
    agentx(&tmp, &config)
        .arg("--parallel")
        .write_stdin(batch)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cycle detected"));
}

#[test]
fn test_config_path_subcommand() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 0");
    agentx(&tmp, &config)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"));
}

#[test]
fn test_config_key_lookup() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(&tmp, "exit 0");
    agentx(&tmp, &config)
        .args(["config", "general.default_backend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("codex"));
}

#[test]
fn test_full_output_replays_events() {
    let tmp = TempDir::new().unwrap();
    let config = stub_config(
        &tmp,
        r#"echo '{"type":"tool_call","name":"bash"}'
echo '{"type":"agent_message","text":"done","final":true}'"#,
    );
    agentx(&tmp, &config)
        .args(["--full-output", "task"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tool_call"))
        .stdout(predicate::str::contains("done"));
}
