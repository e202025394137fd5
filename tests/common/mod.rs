//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::path::Path;

/// Write an executable stub backend script and return its path.
///
/// The script body runs under `/bin/sh`; emit JSON lines on stdout to feed
/// the stream parser.
#[cfg(unix)]
pub fn stub_backend(dir: &Path, name: &str, script_body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

/// A stub that immediately prints one final agent message.
pub fn echo_message_script(message: &str) -> String {
    format!(
        r#"echo '{{"type":"agent_message","text":"{}","final":true}}'"#,
        message
    )
}

/// A stub that sleeps before printing a final agent message.
pub fn sleeping_script(seconds: &str, message: &str) -> String {
    format!(
        r#"sleep {}
echo '{{"type":"agent_message","text":"{}","final":true}}'"#,
        seconds, message
    )
}

/// Assemble a batch document from `(headers, body)` blocks.
pub fn batch_input(blocks: &[(&str, &str)]) -> String {
    let mut out = String::new();
    for (headers, body) in blocks {
        out.push_str("---TASK---\n");
        out.push_str(headers);
        if !headers.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---CONTENT---\n");
        out.push_str(body);
        out.push('\n');
    }
    out
}
