//! Per-task structured log sinks.
//!
//! Every executed task gets its own directory under the run root:
//! `meta.json` (argv, env deltas, timing, drain reason), the raw
//! `stdout.log` and `stderr.log` streams, the canonical `events.jsonl`
//! stream, and the final `result.json`. The directory path is surfaced in
//! the [`TaskResult`](crate::core::parallel::TaskResult) so batch reports
//! can point at it. Rotation and cleanup are left to outer tooling.

use crate::config::Config;
use crate::core::events::CanonicalEvent;
use crate::core::parallel::TaskResult;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Why the post-exit pipe drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainReason {
    /// Both pipes reached EOF before the grace period elapsed.
    WaitDone,
    /// The 500 ms grace period expired with output still pending.
    DrainTimeout,
    /// Cancellation ended the drain early.
    ContextCancel,
}

/// Metadata header written alongside the raw streams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMeta {
    /// Full argv of the spawned backend process.
    pub argv: Vec<String>,
    /// Environment variables added or overridden for the child.
    pub env_overrides: Vec<(String, String)>,
    /// Working directory of the child.
    pub workdir: String,
    /// Start time, milliseconds since the unix epoch.
    pub started_at_ms: u64,
    /// End time, milliseconds since the unix epoch.
    pub ended_at_ms: Option<u64>,
    /// Why the output drain ended.
    pub drain: Option<DrainReason>,
}

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Resolve the root directory for this invocation's logs.
///
/// `general.log_root` (or `AGENTX_TMPDIR`) wins; otherwise logs land under
/// the user cache directory. Each invocation gets a fresh run id.
pub fn run_root(config: &Config) -> PathBuf {
    let base = config.general.log_root.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("agentx")
            .join("logs")
    });
    base.join(uuid::Uuid::new_v4().to_string())
}

/// Log sink for a single task execution.
pub struct TaskLogger {
    dir: PathBuf,
    stdout: Mutex<File>,
    stderr: Mutex<File>,
    events: Mutex<File>,
    meta: Mutex<TaskMeta>,
}

impl TaskLogger {
    /// Create the task's log directory and open its stream files.
    pub fn create(run_root: &Path, task_id: &str) -> Result<Self> {
        let dir = run_root.join(task_id);
        std::fs::create_dir_all(&dir)?;
        let open = |name: &str| -> std::io::Result<File> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        };
        Ok(Self {
            stdout: Mutex::new(open("stdout.log")?),
            stderr: Mutex::new(open("stderr.log")?),
            events: Mutex::new(open("events.jsonl")?),
            meta: Mutex::new(TaskMeta {
                started_at_ms: now_ms(),
                ..Default::default()
            }),
            dir,
        })
    }

    /// The task's log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the spawn header and persist it immediately, so the log is
    /// useful even if the process dies mid-run.
    pub fn record_spawn(
        &self,
        argv: &[String],
        env_overrides: &[(String, String)],
        workdir: &Path,
    ) -> Result<()> {
        {
            let mut meta = self.meta.lock().unwrap();
            meta.argv = argv.to_vec();
            meta.env_overrides = env_overrides.to_vec();
            meta.workdir = workdir.display().to_string();
        }
        self.flush_meta()
    }

    /// Record completion time and the drain outcome.
    pub fn record_end(&self, drain: DrainReason) -> Result<()> {
        {
            let mut meta = self.meta.lock().unwrap();
            meta.ended_at_ms = Some(now_ms());
            meta.drain = Some(drain);
        }
        self.flush_meta()
    }

    /// Append a raw stdout line.
    pub fn stdout_line(&self, line: &str) -> Result<()> {
        let mut file = self.stdout.lock().unwrap();
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Append a raw stderr line.
    pub fn stderr_line(&self, line: &str) -> Result<()> {
        let mut file = self.stderr.lock().unwrap();
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Append a canonical event as one JSON line.
    pub fn event(&self, event: &CanonicalEvent) -> Result<()> {
        let mut file = self.events.lock().unwrap();
        writeln!(file, "{}", serde_json::to_string(event)?)?;
        Ok(())
    }

    /// Write the final task result.
    pub fn result(&self, result: &TaskResult) -> Result<()> {
        let path = self.dir.join("result.json");
        std::fs::write(path, serde_json::to_string_pretty(result)?)?;
        Ok(())
    }

    fn flush_meta(&self) -> Result<()> {
        let meta = self.meta.lock().unwrap().clone();
        std::fs::write(
            self.dir.join("meta.json"),
            serde_json::to_string_pretty(&meta)?,
        )?;
        Ok(())
    }
}
