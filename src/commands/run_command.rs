//! Single-task command: build one [`Task`] from CLI arguments, execute it
//! through the pipeline, and render the canonical output.

use crate::cli::{ui, RunArgs};
use crate::config::{ConfigService, EnvironmentProvider, SystemEnvironmentProvider};
use crate::core::parallel::{Task, TaskExecutor, TaskState};
use crate::core::runner::ProcessExecutor;
use crate::core::tasklog;
use crate::error::AgentXError;
use crate::Result;
use std::io::Read;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Execute a fresh single task.
pub async fn execute(args: RunArgs, config_service: &dyn ConfigService) -> Result<i32> {
    execute_with_session(args, None, config_service).await
}

/// Execute a single task, optionally resuming a backend session.
pub async fn execute_with_session(
    args: RunArgs,
    session_id: Option<String>,
    config_service: &dyn ConfigService,
) -> Result<i32> {
    let mut config = config_service.get_config()?;
    if let Some(timeout) = args.timeout {
        config.general.timeout_ms = timeout;
    }
    if args.skip_permissions {
        config.general.skip_permissions = true;
    }

    let prompt = read_task_input(args.task.as_deref().unwrap_or("-"))?;
    let task = Task {
        id: "task".to_string(),
        workdir: args.workdir.clone(),
        backend: args.backend.clone(),
        agent: args.agent.clone(),
        prompt,
        dependencies: Vec::new(),
        session_id,
        skills: args.skill_list(),
        prompt_file: args.prompt_file.clone(),
        reasoning_effort: args.reasoning_effort.clone(),
        model: args.model.clone(),
        skip_permissions: args.skip_permissions.then_some(true),
        allowed_tools: Vec::new(),
        disallowed_tools: Vec::new(),
        worktree: args.worktree,
        force_stdin: args.stdin_prompt,
    };

    let run_root = tasklog::run_root(&config);
    let env_provider = SystemEnvironmentProvider::new();
    let external_worktree = env_provider.get_var("AGENTX_WORKTREE").map(PathBuf::from);
    let executor =
        ProcessExecutor::new(config, run_root).with_external_worktree(external_worktree);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let result = executor.execute(task, cancel).await;

    if args.full_output {
        print_event_stream(result.log_dir.as_deref())?;
    }

    match result.state {
        TaskState::Succeeded => {
            ui::display_task_output(&result.agent_message, result.session_id.as_deref());
        }
        state => {
            ui::print_error(&format!(
                "task {}: {}",
                state,
                result.error.as_deref().unwrap_or("no further detail")
            ));
            if let Some(log_dir) = &result.log_dir {
                eprintln!("log: {}", log_dir.display());
            }
        }
    }

    Ok(result.exit_code.unwrap_or(1))
}

/// Read the task body, replacing `-` with standard input.
fn read_task_input(task: &str) -> Result<String> {
    if task != "-" {
        return Ok(task.to_string());
    }
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .map_err(AgentXError::Io)?;
    if body.trim().is_empty() {
        return Err(AgentXError::invalid_config(
            "empty task body on standard input",
        ));
    }
    Ok(body)
}

/// Replay the canonical event stream from the task's log directory.
fn print_event_stream(log_dir: Option<&std::path::Path>) -> Result<()> {
    let Some(dir) = log_dir else {
        return Ok(());
    };
    let path = dir.join("events.jsonl");
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            for line in contents.lines() {
                println!("{}", line);
            }
            Ok(())
        }
        Err(_) => Ok(()), // no events were recorded
    }
}
