//! Arguments shared by the single-task, resume, and parallel entry points.

use clap::Args;
use std::path::PathBuf;

/// Task execution arguments.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Task description, or `-` to read it from standard input
    pub task: Option<String>,

    /// Working directory for the task
    pub workdir: Option<PathBuf>,

    /// Backend to run the task on
    #[arg(long, value_parser = ["codex", "claude", "gemini", "opencode"])]
    pub backend: Option<String>,

    /// Model override for the selected backend
    #[arg(long)]
    pub model: Option<String>,

    /// Agent preset to merge into the task
    #[arg(long)]
    pub agent: Option<String>,

    /// Prompt file wrapped around the task body (must live under an
    /// allowed root)
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Comma-separated skill names to inject (disables auto-detection)
    #[arg(long)]
    pub skills: Option<String>,

    /// Reasoning effort for the backend
    #[arg(long, value_parser = ["low", "medium", "high"])]
    pub reasoning_effort: Option<String>,

    /// Pass the backend's permission-bypass flags
    #[arg(long)]
    pub skip_permissions: bool,

    /// Run inside a freshly provisioned git worktree
    #[arg(long)]
    pub worktree: bool,

    /// Read a batch of tasks from standard input and run them in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Cancel not-yet-started batch tasks after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Print every canonical event instead of only the final message
    #[arg(long)]
    pub full_output: bool,

    /// Always deliver the prompt via standard input
    #[arg(long)]
    pub stdin_prompt: bool,

    /// Per-task timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Worker pool capacity for parallel batches (0 = unbounded, capped
    /// at 100)
    #[arg(long)]
    pub max_workers: Option<usize>,
}

impl RunArgs {
    /// Validate flag combinations before dispatch.
    pub fn validate(&self) -> Result<(), String> {
        if self.parallel {
            if self.task.is_some() || self.workdir.is_some() {
                return Err(
                    "--parallel reads tasks from stdin and accepts no positional arguments"
                        .to_string(),
                );
            }
        } else if self.task.is_none() {
            return Err("missing task description (or '-' for stdin)".to_string());
        }
        Ok(())
    }

    /// Parsed skill list, when `--skills` was given.
    pub fn skill_list(&self) -> Option<Vec<String>> {
        self.skills.as_ref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
