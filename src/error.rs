//! Error types for the AgentX CLI wrapper.
//!
//! This module defines the `AgentXError` enum covering all error conditions
//! that can occur while parsing batch configurations, resolving backends,
//! provisioning worktrees, and driving backend processes.
//!
//! It also provides helper methods to construct errors, map them to process
//! exit codes, and generate user-friendly messages.
use thiserror::Error;

/// Represents all possible errors in the AgentX application.
///
/// Each variant provides specific context to facilitate debugging and
/// user-friendly reporting.
///
/// # Examples
///
/// ```rust
/// use agentx_cli::error::{AgentXError, AgentXResult};
///
/// fn example() -> AgentXResult<()> {
///     Err(AgentXError::invalid_config("duplicate task id: build"))
/// }
/// ```
///
/// # Exit Codes
///
/// Each error variant maps to an exit code via `AgentXError::exit_code`:
/// 1 for configuration and execution failures, 124 for timeouts, 127 for
/// missing backend executables, and 130 for external interruption.
#[derive(Error, Debug)]
pub enum AgentXError {
    /// I/O operation failed during file system or pipe access.
    ///
    /// This variant wraps `std::io::Error` and covers failed spawns,
    /// pipe read errors, and log-write errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration: bad batch grammar, duplicate ids, cyclic
    /// dependencies, unknown backends, or missing required fields.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// Batch grammar violation with source location.
    ///
    /// Carries the zero-based task index and one-based line number of the
    /// offending input so batch authors can find the problem quickly.
    #[error("Invalid batch config (task {task_index}, line {line}): {message}")]
    BatchSyntax {
        /// Zero-based index of the offending task block
        task_index: usize,
        /// One-based line number in the batch input
        line: usize,
        /// Description of the grammar violation
        message: String,
    },

    /// A required precondition does not hold: worktree requested outside a
    /// repository, missing agent-preset file, or a prompt file outside the
    /// allowed directories.
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the failed precondition
        message: String,
    },

    /// The backend executable was not found on PATH.
    #[error("Backend executable not found: {program}")]
    BackendNotFound {
        /// The program name that could not be resolved
        program: String,
    },

    /// A task exceeded its wall-clock timeout.
    #[error("Task {task_id} timed out after {limit_ms} ms")]
    TaskTimeout {
        /// Identifier of the task that timed out
        task_id: String,
        /// The configured limit in milliseconds
        limit_ms: u64,
    },

    /// Execution was interrupted by an external cancellation signal.
    #[error("Interrupted")]
    Cancelled,

    /// The backend process exited non-zero or produced no agent message.
    #[error("Task {task_id} failed (exit {exit_code}): {message}")]
    ExecutionFailure {
        /// Identifier of the failing task
        task_id: String,
        /// Exit code reported by the backend process
        exit_code: i32,
        /// Description of the failure
        message: String,
    },

    /// A worktree branch already exists for the requested task.
    #[error("Worktree branch already exists: {branch}")]
    WorktreeConflict {
        /// The conflicting branch name
        branch: String,
    },

    /// Catch-all error variant wrapping any other failure.
    #[error("Unknown error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for AgentXError {
    fn from(err: serde_json::Error) -> Self {
        AgentXError::InvalidConfig {
            message: format!("JSON serialization/deserialization error: {}", err),
        }
    }
}

/// Specialized `Result` type for AgentX operations.
pub type AgentXResult<T> = Result<T, AgentXError>;

impl AgentXError {
    /// Create an invalid configuration error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use agentx_cli::error::AgentXError;
    /// let err = AgentXError::invalid_config("unknown backend: cursor");
    /// assert_eq!(err.to_string(), "Invalid configuration: unknown backend: cursor");
    /// ```
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        AgentXError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a batch grammar error at the given task index and line.
    pub fn batch_syntax<S: Into<String>>(task_index: usize, line: usize, message: S) -> Self {
        AgentXError::BatchSyntax {
            task_index,
            line,
            message: message.into(),
        }
    }

    /// Create a precondition failure with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use agentx_cli::error::AgentXError;
    /// let err = AgentXError::precondition_failed("not a git repository");
    /// assert!(err.to_string().contains("not a git repository"));
    /// ```
    pub fn precondition_failed<S: Into<String>>(message: S) -> Self {
        AgentXError::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Create a backend-not-found error for the given program name.
    pub fn backend_not_found<S: Into<String>>(program: S) -> Self {
        AgentXError::BackendNotFound {
            program: program.into(),
        }
    }

    /// Create a task timeout error with task id and configured limit.
    pub fn task_timeout<S: Into<String>>(task_id: S, limit_ms: u64) -> Self {
        AgentXError::TaskTimeout {
            task_id: task_id.into(),
            limit_ms,
        }
    }

    /// Create an execution failure error with task id, exit code, and reason.
    pub fn execution_failure<S1, S2>(task_id: S1, exit_code: i32, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        AgentXError::ExecutionFailure {
            task_id: task_id.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Return the corresponding process exit code for this error variant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use agentx_cli::error::AgentXError;
    /// assert_eq!(AgentXError::invalid_config("x").exit_code(), 1);
    /// assert_eq!(AgentXError::Cancelled.exit_code(), 130);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentXError::Io(_) => 1,
            AgentXError::InvalidConfig { .. } => 1,
            AgentXError::BatchSyntax { .. } => 1,
            AgentXError::PreconditionFailed { .. } => 1,
            AgentXError::BackendNotFound { .. } => 127,
            AgentXError::TaskTimeout { .. } => 124,
            AgentXError::Cancelled => 130,
            // A backend that "succeeded" with no output still maps to 1.
            AgentXError::ExecutionFailure { exit_code, .. } => {
                if *exit_code == 0 {
                    1
                } else {
                    *exit_code
                }
            }
            AgentXError::WorktreeConflict { .. } => 1,
            AgentXError::Other(_) => 1,
        }
    }

    /// Return a user-friendly error message with suggested remedies.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use agentx_cli::error::AgentXError;
    /// let msg = AgentXError::invalid_config("bad key").user_friendly_message();
    /// assert!(msg.contains("Invalid configuration:"));
    /// ```
    pub fn user_friendly_message(&self) -> String {
        match self {
            AgentXError::Io(e) => format!("File operation error: {}", e),
            AgentXError::InvalidConfig { message } => format!(
                "Invalid configuration: {}\nHint: run 'agentx config --path' to locate your config file",
                message
            ),
            AgentXError::BatchSyntax {
                task_index,
                line,
                message,
            } => format!(
                "Invalid batch config at task {} (line {}): {}\nHint: each task needs '---TASK---', an 'id:' header, and '---CONTENT---'",
                task_index, line, message
            ),
            AgentXError::PreconditionFailed { message } => {
                format!("Precondition failed: {}", message)
            }
            AgentXError::BackendNotFound { program } => format!(
                "Backend executable not found: {}\nHint: install it or set backends.<name>.executable in the config",
                program
            ),
            AgentXError::TaskTimeout { task_id, limit_ms } => format!(
                "Task {} timed out after {} ms\nHint: raise AGENTX_TIMEOUT or --timeout for long-running tasks",
                task_id, limit_ms
            ),
            AgentXError::Cancelled => "Interrupted".to_string(),
            AgentXError::ExecutionFailure {
                task_id,
                exit_code,
                message,
            } => format!("Task {} failed (exit {}): {}", task_id, exit_code, message),
            AgentXError::WorktreeConflict { branch } => format!(
                "Worktree branch already exists: {}\nHint: delete the stale branch or pick a different task id",
                branch
            ),
            AgentXError::Other(err) => {
                format!("Unknown error: {}\nHint: please report this issue", err)
            }
        }
    }
}
