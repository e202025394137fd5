//! Codex backend adapter.
//!
//! Runs `codex exec --json` and always skips the git-repo check so tasks
//! can run in bare directories and fresh worktrees. In fresh sessions the
//! bypass-approvals-and-sandbox flag is added unless explicitly disabled
//! via `backends.codex.bypass_sandbox` or `AGENTX_CODEX_BYPASS`.

use super::Invocation;
use crate::config::Config;

/// Flags added when permission-skipping is requested.
pub const YOLO_FLAGS: [&str; 1] = ["--dangerously-bypass-approvals-and-sandbox"];

/// Built-in stderr noise patterns.
pub const STDERR_FILTERS: &[&str] = &[
    r"Reading prompt from stdin",
    r"^\[\d{4}-\d{2}-\d{2}T[0-9:.]+\]\s+INFO",
];

/// Assemble argv for a Codex invocation.
pub fn argv(invocation: &Invocation, config: &Config) -> Vec<String> {
    let mut args = vec!["exec".to_string(), "--json".to_string()];

    // codex refuses to run outside a repository without this
    args.push("--skip-git-repo-check".to_string());

    if let Some(session_id) = &invocation.session_id {
        args.push("resume".to_string());
        args.push(session_id.clone());
    } else if config.backends.codex.bypass_sandbox || invocation.skip_permissions {
        for flag in YOLO_FLAGS {
            args.push(flag.to_string());
        }
    }

    if let Some(model) = &invocation.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }

    if let Some(effort) = &invocation.reasoning_effort {
        args.push("-c".to_string());
        args.push(format!("model_reasoning_effort=\"{}\"", effort));
    }

    if invocation.prompt_via_stdin {
        args.push("-".to_string());
    } else {
        args.push(invocation.prompt.clone());
    }
    args
}

/// Assemble child environment overrides for Codex.
pub fn env(_invocation: &Invocation) -> Vec<(String, String)> {
    // keep codex's own logging out of the parsed stream
    vec![("RUST_LOG".to_string(), "error".to_string())]
}
