//! Backend process lifecycle: spawn, stream consumption, timeout and
//! signal escalation, and the post-exit drain window.
//!
//! Processes are always spawned through the process API, never a shell, so
//! prompt text cannot be reinterpreted as shell syntax. Each child owns
//! exactly three handles here: the process itself and its two pipes.

use crate::core::events::{CanonicalEvent, ParserStyle, StreamParser};
use crate::core::tasklog::{DrainReason, TaskLogger};
use crate::error::AgentXError;
use crate::services::backends::BackendSpec;
use crate::Result;
use log::{debug, warn};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

/// Grace period between SIGTERM and SIGKILL.
pub const TERM_GRACE: Duration = Duration::from_secs(5);
/// Post-exit window for the pipe readers to finish.
pub const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// What happened to one backend process.
#[derive(Debug)]
pub struct ProcessOutcome {
    /// Normalized exit code (124 on timeout, 130 on cancellation).
    pub exit_code: i32,
    /// The wall-clock timeout fired.
    pub timed_out: bool,
    /// External cancellation terminated the process.
    pub cancelled: bool,
    /// How the drain window ended.
    pub drain: DrainReason,
    /// Canonical events parsed from stdout, in emission order.
    pub events: Vec<CanonicalEvent>,
}

/// Run one backend process to completion.
///
/// `stdin_payload` closes the child's stdin after writing; `None` attaches
/// a null stdin. The cancellation token triggers SIGTERM, escalating to
/// SIGKILL after [`TERM_GRACE`], and the same escalation handles timeouts.
pub async fn run(
    spec: &BackendSpec,
    argv: &[String],
    env: &[(String, String)],
    workdir: &Path,
    stdin_payload: Option<&str>,
    timeout: Duration,
    cancel: &CancellationToken,
    logger: Arc<TaskLogger>,
) -> Result<ProcessOutcome> {
    let mut command = Command::new(&spec.program);
    command
        .args(argv)
        .current_dir(workdir)
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AgentXError::backend_not_found(&spec.program)
        } else {
            AgentXError::Io(e)
        }
    })?;
    debug!("spawned {} (pid {:?})", spec.program, child.id());

    if let Some(payload) = stdin_payload {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        let payload = payload.to_string();
        tokio::spawn(async move {
            // a child that exits without reading is not an error here
            let _ = stdin.write_all(payload.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }

    let events: Arc<Mutex<Vec<CanonicalEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let stdout_task = tokio::spawn(read_stdout(
        stdout,
        spec.parser_style,
        Arc::clone(&events),
        Arc::clone(&logger),
    ));
    let stderr_task = tokio::spawn(read_stderr(stderr, spec.clone(), Arc::clone(&logger)));

    let mut timed_out = false;
    let mut cancelled = false;
    let status = tokio::select! {
        status = child.wait() => status?,
        _ = tokio::time::sleep(timeout) => {
            warn!("{} exceeded its {} ms timeout", spec.program, timeout.as_millis());
            timed_out = true;
            terminate(&mut child).await?
        }
        _ = cancel.cancelled() => {
            warn!("cancellation: terminating {}", spec.program);
            cancelled = true;
            terminate(&mut child).await?
        }
    };

    // Give the pipe readers a bounded window to catch up with buffered
    // output, and record why the window closed.
    let drain = {
        let join = futures::future::join(stdout_task, stderr_task);
        tokio::pin!(join);
        tokio::select! {
            _ = &mut join => DrainReason::WaitDone,
            _ = tokio::time::sleep(DRAIN_GRACE) => DrainReason::DrainTimeout,
            _ = cancel.cancelled(), if !cancelled => DrainReason::ContextCancel,
        }
    };
    logger.record_end(drain)?;

    let exit_code = if timed_out {
        124
    } else if cancelled {
        130
    } else {
        status.code().unwrap_or(1)
    };

    let events = {
        let mut sink = events.lock().unwrap();
        std::mem::take(&mut *sink)
    };
    Ok(ProcessOutcome {
        exit_code,
        timed_out,
        cancelled,
        drain,
        events,
    })
}

/// SIGTERM, then SIGKILL after the grace period.
async fn terminate(child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
    send_sigterm(child);
    match tokio::time::timeout(TERM_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("grace period expired, killing pid {:?}", child.id());
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: signalling a pid we own; failure is harmless (the child
        // may have exited already)
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &Child) {
    let _ = child.start_kill();
}

async fn read_stdout(
    stdout: ChildStdout,
    style: ParserStyle,
    sink: Arc<Mutex<Vec<CanonicalEvent>>>,
    logger: Arc<TaskLogger>,
) {
    let mut parser = StreamParser::new(style);
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if logger.stdout_line(&line).is_err() {
                    warn!("failed to append stdout log line");
                }
                for event in parser.parse_line(&line) {
                    let _ = logger.event(&event);
                    sink.lock().unwrap().push(event);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("stdout read error: {}", e);
                break;
            }
        }
    }
    if let Some(event) = parser.finish() {
        let _ = logger.event(&event);
        sink.lock().unwrap().push(event);
    }
}

async fn read_stderr(stderr: ChildStderr, spec: BackendSpec, logger: Arc<TaskLogger>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if spec.stderr_filtered(&line) {
            continue;
        }
        if logger.stderr_line(&line).is_err() {
            warn!("failed to append stderr log line");
        }
    }
}
