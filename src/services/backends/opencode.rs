//! OpenCode backend adapter, the minimal one.

use super::Invocation;

/// OpenCode exposes no permission bypass; the list is empty by contract.
pub const YOLO_FLAGS: [&str; 0] = [];

/// Built-in stderr noise patterns.
pub const STDERR_FILTERS: &[&str] = &[];

/// Assemble argv for an OpenCode invocation.
pub fn argv(invocation: &Invocation) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--format".to_string(), "json".to_string()];

    if let Some(model) = &invocation.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(session_id) = &invocation.session_id {
        args.push("--session".to_string());
        args.push(session_id.clone());
    }
    if !invocation.prompt_via_stdin {
        args.push(invocation.prompt.clone());
    }
    args
}

/// Assemble child environment overrides for OpenCode.
pub fn env(_invocation: &Invocation) -> Vec<(String, String)> {
    Vec::new()
}
