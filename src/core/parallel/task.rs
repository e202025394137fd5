//! Task definition and result types for batch execution.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The atomic unit of execution.
///
/// A task is produced either by the CLI (single-task mode) or the batch
/// config parser, then handed to the scheduler and the execution pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within a batch.
    pub id: String,
    /// Working directory; the caller's current directory when absent.
    pub workdir: Option<PathBuf>,
    /// Backend selector; falls back to the preset, then the config default.
    pub backend: Option<String>,
    /// Agent-preset name merged in before execution.
    pub agent: Option<String>,
    /// The prompt body, arbitrary text including code.
    pub prompt: String,
    /// Ids of tasks that must reach a terminal state first.
    pub dependencies: Vec<String>,
    /// Resume this backend session instead of starting fresh.
    pub session_id: Option<String>,
    /// Explicit skill names. `None` requests auto-detection from the
    /// working directory; an empty list disables injection entirely.
    pub skills: Option<Vec<String>>,
    /// Prompt file whose contents wrap the body.
    pub prompt_file: Option<PathBuf>,
    /// Reasoning effort: low, medium, or high.
    pub reasoning_effort: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Pass the backend's permission-bypass flags.
    pub skip_permissions: Option<bool>,
    /// Tools the backend may use.
    pub allowed_tools: Vec<String>,
    /// Tools the backend must not use.
    pub disallowed_tools: Vec<String>,
    /// Run inside a freshly provisioned git worktree.
    pub worktree: bool,
    /// Always deliver the prompt on stdin, bypassing the heuristic.
    pub force_stdin: bool,
}

impl Task {
    /// Create a task with the given id and prompt body.
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, prompt: S2) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Terminal state of an attempted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Exit 0 with a non-empty agent message.
    Succeeded,
    /// Non-zero exit, empty output, or an internal pipeline error.
    Failed,
    /// Never executed because a dependency did not succeed.
    Skipped,
    /// Cancelled before or during execution.
    Cancelled,
    /// Wall-clock timeout expired.
    TimedOut,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
            TaskState::Cancelled => "cancelled",
            TaskState::TimedOut => "timed-out",
        };
        write!(f, "{}", s)
    }
}

/// Summary fields extracted from a final agent message.
///
/// Populated from the canonical `Did:` / `Files:` / `Tests:` / `Coverage:`
/// headers; absent headers yield empty fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// What the agent reports having done.
    pub did: String,
    /// Files the agent reports touching.
    pub files: String,
    /// Test count or description.
    pub tests: String,
    /// Coverage figure, verbatim.
    pub coverage: String,
    /// Set when the coverage percentage parses below 90.
    pub coverage_below_threshold: bool,
}

/// The outcome of one attempted task.
///
/// Created when the scheduler commits a task to a worker, mutated only by
/// that worker, and frozen once the terminal state is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result belongs to.
    pub task_id: String,
    /// Terminal state.
    pub state: TaskState,
    /// Session id reported by the backend, if any.
    pub session_id: Option<String>,
    /// Final agent message in canonical text form.
    pub agent_message: String,
    /// Per-task structured log directory.
    pub log_dir: Option<PathBuf>,
    /// Process exit status, when a process ran.
    pub exit_code: Option<i32>,
    /// Error descriptor, when the task did not succeed.
    pub error: Option<String>,
    /// Summary extracted from the agent message.
    pub summary: Option<TaskSummary>,
}

impl TaskResult {
    /// Result for a task skipped because a dependency did not succeed.
    pub fn skipped(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            state: TaskState::Skipped,
            session_id: None,
            agent_message: String::new(),
            log_dir: None,
            exit_code: None,
            error: Some("dependency-failed".to_string()),
            summary: None,
        }
    }

    /// Result for a task cancelled before it started.
    pub fn cancelled(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            state: TaskState::Cancelled,
            session_id: None,
            agent_message: String::new(),
            log_dir: None,
            exit_code: Some(130),
            error: Some("cancelled".to_string()),
            summary: None,
        }
    }
}

/// Aggregated outcome of a parallel invocation.
///
/// Results are kept in submission order regardless of completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Total number of submitted tasks.
    pub total: usize,
    /// Count of succeeded tasks.
    pub succeeded: usize,
    /// Count of failed tasks.
    pub failed: usize,
    /// Count of skipped tasks.
    pub skipped: usize,
    /// Count of cancelled tasks.
    pub cancelled: usize,
    /// Count of timed-out tasks.
    pub timed_out: usize,
    /// Whether the batch received an external cancellation signal.
    pub externally_cancelled: bool,
    /// Per-task results in submission order.
    pub results: Vec<TaskResult>,
}

impl BatchReport {
    /// Build a report from results already in submission order.
    pub fn from_results(results: Vec<TaskResult>, externally_cancelled: bool) -> Self {
        let mut report = Self {
            total: results.len(),
            externally_cancelled,
            ..Default::default()
        };
        for result in &results {
            match result.state {
                TaskState::Succeeded => report.succeeded += 1,
                TaskState::Failed => report.failed += 1,
                TaskState::Skipped => report.skipped += 1,
                TaskState::Cancelled => report.cancelled += 1,
                TaskState::TimedOut => report.timed_out += 1,
            }
        }
        report.results = results;
        report
    }

    /// Derive the overall process exit code.
    ///
    /// 0 when everything succeeded; otherwise the numerically smallest of
    /// the applicable codes: 1 for failures/skips/fail-fast cancellations,
    /// 124 for timeouts, 130 for an external cancel.
    pub fn exit_code(&self) -> i32 {
        let mut candidates = Vec::new();
        if self.failed > 0 || self.skipped > 0 {
            candidates.push(1);
        }
        if self.cancelled > 0 && !self.externally_cancelled {
            candidates.push(1);
        }
        if self.timed_out > 0 {
            candidates.push(124);
        }
        if self.externally_cancelled {
            candidates.push(130);
        }
        candidates.into_iter().min().unwrap_or(0)
    }
}
