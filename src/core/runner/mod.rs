//! Per-task execution pipeline.
//!
//! Takes one [`Task`] end-to-end: resolve the working directory (including
//! worktree provisioning), merge the agent preset, assemble the final
//! prompt and the backend argv/env, spawn and supervise the process, and
//! classify the outcome into a [`TaskResult`].
//!
//! [`ProcessExecutor`] is the production [`TaskExecutor`] used by both the
//! single-task command and the batch scheduler.

pub mod process;
pub mod prompt;
pub mod summary;

use crate::config::{AgentPreset, Config};
use crate::core::events::{final_agent_message, session_id, CanonicalEvent};
use crate::core::parallel::{Task, TaskExecutor, TaskResult, TaskState};
use crate::core::tasklog::TaskLogger;
use crate::core::worktree::WorktreeManager;
use crate::error::AgentXError;
use crate::services::backends::{BackendSpec, Invocation};
use crate::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything needed to spawn one backend process.
struct Launch {
    spec: BackendSpec,
    argv: Vec<String>,
    env: Vec<(String, String)>,
    workdir: PathBuf,
    stdin_payload: Option<String>,
}

/// Production task executor driving real backend processes.
pub struct ProcessExecutor {
    config: Config,
    run_root: PathBuf,
    external_worktree: Option<PathBuf>,
}

impl ProcessExecutor {
    /// Create an executor writing task logs under `run_root`.
    pub fn new(config: Config, run_root: PathBuf) -> Self {
        Self {
            config,
            run_root,
            external_worktree: None,
        }
    }

    /// Adopt an externally provisioned worktree (`AGENTX_WORKTREE`).
    ///
    /// When set, tasks run inside that tree and a `--worktree` request is a
    /// no-op instead of creating a second tree.
    pub fn with_external_worktree(mut self, path: Option<PathBuf>) -> Self {
        self.external_worktree = path;
        self
    }

    /// Fallible half of execution: all the assembly before spawn.
    async fn prepare(&self, task: &Task) -> Result<Launch> {
        let preset = self.resolve_preset(task)?;

        let backend_name = task
            .backend
            .clone()
            .or_else(|| preset.as_ref().and_then(|p| p.backend.clone()))
            .unwrap_or_else(|| self.config.general.default_backend.clone());
        let spec = BackendSpec::resolve(&backend_name, &self.config)?;

        let workdir = self.resolve_workdir(task).await?;

        let prompt_file = task
            .prompt_file
            .clone()
            .or_else(|| preset.as_ref().and_then(|p| p.prompt_file.clone()));
        let final_prompt = prompt::assemble(task, prompt_file.as_deref(), &workdir, &self.config)?;

        let via_stdin = task.force_stdin || prompt::needs_stdin(&final_prompt);

        let invocation = Invocation {
            model: task
                .model
                .clone()
                .or_else(|| preset.as_ref().and_then(|p| p.model.clone()))
                .or_else(|| self.config.general.default_model.clone()),
            session_id: task.session_id.clone(),
            skip_permissions: task.skip_permissions.unwrap_or_else(|| {
                preset
                    .as_ref()
                    .and_then(|p| p.yolo)
                    .unwrap_or(self.config.general.skip_permissions)
            }),
            reasoning_effort: task
                .reasoning_effort
                .clone()
                .or_else(|| preset.as_ref().and_then(|p| p.reasoning_effort.clone())),
            allowed_tools: if task.allowed_tools.is_empty() {
                preset
                    .as_ref()
                    .map(|p| p.allowed_tools.clone())
                    .unwrap_or_default()
            } else {
                task.allowed_tools.clone()
            },
            disallowed_tools: if task.disallowed_tools.is_empty() {
                preset
                    .as_ref()
                    .map(|p| p.disallowed_tools.clone())
                    .unwrap_or_default()
            } else {
                task.disallowed_tools.clone()
            },
            prompt_via_stdin: via_stdin,
            prompt: final_prompt,
            preset_env: preset
                .as_ref()
                .map(|p| {
                    let mut pairs: Vec<(String, String)> =
                        p.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    pairs.sort();
                    pairs
                })
                .unwrap_or_default(),
        };

        let argv = spec.assemble_argv(&invocation, &self.config);
        let env = spec.assemble_env(&invocation, &self.config)?;
        let stdin_payload = via_stdin.then(|| invocation.prompt.clone());

        Ok(Launch {
            spec,
            argv,
            env,
            workdir,
            stdin_payload,
        })
    }

    /// Look up the task's agent preset, if it names one.
    fn resolve_preset(&self, task: &Task) -> Result<Option<AgentPreset>> {
        let Some(name) = &task.agent else {
            return Ok(None);
        };
        let preset = self.config.agents.get(name).cloned().ok_or_else(|| {
            AgentXError::precondition_failed(format!("unknown agent preset: {}", name))
        })?;
        if let (Some(task_backend), Some(preset_backend)) =
            (task.backend.as_deref(), preset.backend.as_deref())
        {
            if task_backend != preset_backend {
                warn!(
                    "task {}: backend '{}' overrides preset '{}' backend '{}'",
                    task.id, task_backend, name, preset_backend
                );
            }
        }
        Ok(Some(preset))
    }

    /// Resolve the effective working directory, provisioning or reusing a
    /// worktree when requested.
    async fn resolve_workdir(&self, task: &Task) -> Result<PathBuf> {
        let base = match &task.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        if let Some(external) = &self.external_worktree {
            let handle = WorktreeManager::reuse(external, &task.id).await?;
            if task.worktree {
                debug!(
                    "task {}: --worktree is a no-op, reusing {}",
                    task.id,
                    handle.path.display()
                );
            }
            return Ok(handle.path);
        }
        if task.worktree {
            let handle = WorktreeManager::provision(&base, &task.id).await?;
            return Ok(handle.path);
        }
        Ok(base)
    }

    /// Run the prepared process and classify its outcome.
    async fn run_prepared(
        &self,
        task: &Task,
        launch: Launch,
        cancel: CancellationToken,
        logger: Arc<TaskLogger>,
    ) -> Result<TaskResult> {
        let mut meta_argv = vec![launch.spec.program.clone()];
        meta_argv.extend(launch.argv.iter().cloned());
        logger.record_spawn(&meta_argv, &launch.env, &launch.workdir)?;

        let timeout = Duration::from_millis(self.config.general.timeout_ms);
        let outcome = process::run(
            &launch.spec,
            &launch.argv,
            &launch.env,
            &launch.workdir,
            launch.stdin_payload.as_deref(),
            timeout,
            &cancel,
            Arc::clone(&logger),
        )
        .await?;

        let message = final_agent_message(&outcome.events);
        let session = session_id(&outcome.events);
        let backend_error = outcome.events.iter().rev().find_map(|e| match e {
            CanonicalEvent::Error { message } => Some(message.clone()),
            _ => None,
        });

        let (state, exit_code, error) = if outcome.timed_out || outcome.exit_code == 124 {
            (
                TaskState::TimedOut,
                124,
                Some(format!(
                    "timed out after {} ms",
                    self.config.general.timeout_ms
                )),
            )
        } else if outcome.cancelled || outcome.exit_code == 130 {
            (TaskState::Cancelled, 130, Some("cancelled".to_string()))
        } else if outcome.exit_code == 0 && !message.trim().is_empty() {
            (TaskState::Succeeded, 0, None)
        } else if outcome.exit_code == 0 {
            (
                TaskState::Failed,
                1,
                Some("backend exited 0 but produced no agent message".to_string()),
            )
        } else {
            (
                TaskState::Failed,
                outcome.exit_code,
                Some(backend_error.unwrap_or_else(|| {
                    format!("backend exited with status {}", outcome.exit_code)
                })),
            )
        };

        let summary = if message.trim().is_empty() {
            None
        } else {
            summary::extract(&message)
        };

        let result = TaskResult {
            task_id: task.id.clone(),
            state,
            session_id: session,
            agent_message: message,
            log_dir: Some(logger.dir().to_path_buf()),
            exit_code: Some(exit_code),
            error,
            summary,
        };
        logger.result(&result)?;
        Ok(result)
    }

    /// Map an assembly or spawn error onto a terminal task result.
    fn error_result(task_id: &str, err: AgentXError, log_dir: Option<PathBuf>) -> TaskResult {
        let (state, exit_code) = match &err {
            AgentXError::TaskTimeout { .. } => (TaskState::TimedOut, 124),
            AgentXError::Cancelled => (TaskState::Cancelled, 130),
            _ => (TaskState::Failed, err.exit_code()),
        };
        TaskResult {
            task_id: task_id.to_string(),
            state,
            session_id: None,
            agent_message: String::new(),
            log_dir,
            exit_code: Some(exit_code),
            error: Some(err.to_string()),
            summary: None,
        }
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(&self, task: Task, cancel: CancellationToken) -> TaskResult {
        let logger = match TaskLogger::create(&self.run_root, &task.id) {
            Ok(logger) => Arc::new(logger),
            Err(e) => return Self::error_result(&task.id, e, None),
        };
        let log_dir = Some(logger.dir().to_path_buf());

        let launch = match self.prepare(&task).await {
            Ok(launch) => launch,
            Err(e) => {
                let result = Self::error_result(&task.id, e, log_dir);
                let _ = logger.result(&result);
                return result;
            }
        };

        match self.run_prepared(&task, launch, cancel, Arc::clone(&logger)).await {
            Ok(result) => result,
            Err(e) => {
                let result = Self::error_result(&task.id, e, log_dir);
                let _ = logger.result(&result);
                result
            }
        }
    }
}
