//! Gemini backend adapter.
//!
//! Runs the Gemini CLI with JSON output. The user's `~/.gemini/.env` file
//! is consulted for the API key, default model, and auth mechanism; when an
//! API key is present the bearer mechanism is forced so the CLI does not
//! fall back to interactive OAuth inside a batch.

use super::Invocation;
use crate::config::Config;
use crate::Result;
use std::path::PathBuf;

/// Flags added when permission-skipping is requested.
pub const YOLO_FLAGS: [&str; 1] = ["--yolo"];

/// Built-in stderr noise patterns.
pub const STDERR_FILTERS: &[&str] = &[r"Loaded cached credentials", r"^\s*Deprecation"];

/// Environment keys forwarded from the `.env` file into the child.
const FORWARDED_KEYS: [&str; 4] = [
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "GEMINI_MODEL",
    "GEMINI_AUTH_MECHANISM",
];

fn env_file_path(config: &Config) -> PathBuf {
    config.backends.gemini.env_file.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gemini")
            .join(".env")
    })
}

/// Assemble argv for a Gemini invocation.
pub fn argv(invocation: &Invocation) -> Vec<String> {
    let mut args = vec!["--output-format".to_string(), "json".to_string()];

    if let Some(model) = &invocation.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(session_id) = &invocation.session_id {
        args.push("--resume".to_string());
        args.push(session_id.clone());
    }
    if invocation.skip_permissions {
        for flag in YOLO_FLAGS {
            args.push(flag.to_string());
        }
    }
    if !invocation.prompt_via_stdin {
        args.push(invocation.prompt.clone());
    }
    args
}

/// Assemble child environment overrides for Gemini.
///
/// Recognized keys from the `.env` file are forwarded; everything else in
/// that file is ignored rather than leaked into the child.
pub fn env(_invocation: &Invocation, config: &Config) -> Result<Vec<(String, String)>> {
    let mut env: Vec<(String, String)> = Vec::new();

    let path = env_file_path(config);
    if let Ok(raw) = std::fs::read_to_string(&path) {
        for (key, value) in parse_env_file(&raw) {
            if FORWARDED_KEYS.contains(&key.as_str()) {
                env.push((key, value));
            }
        }
    }

    let has_api_key = env
        .iter()
        .any(|(k, _)| k == "GEMINI_API_KEY" || k == "GOOGLE_API_KEY");
    if has_api_key {
        env.retain(|(k, _)| k != "GEMINI_AUTH_MECHANISM");
        env.push(("GEMINI_AUTH_MECHANISM".to_string(), "bearer".to_string()));
    }
    Ok(env)
}

/// Parse `KEY=VALUE` lines, tolerating comments, blank lines, `export`
/// prefixes, and single or double quoting.
fn parse_env_file(raw: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_string();
        let mut value = value.trim();
        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = &value[1..value.len() - 1];
        }
        pairs.push((key, value.to_string()));
    }
    pairs
}
