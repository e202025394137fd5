//! Batch task-configuration parser.
//!
//! Parses the line-oriented batch grammar consumed by `--parallel`:
//!
//! ```text
//! ---TASK---
//! id: build
//! dependencies: fmt, lint
//! ---CONTENT---
//! Run the build and fix anything that breaks.
//! ---TASK---
//! ...
//! ```
//!
//! A header region of `key: value` lines is followed by `---CONTENT---` and
//! a free-form body extending to the next `---TASK---` or end of input.
//! Unknown header keys produce a warning and are discarded; structural
//! violations are reported with the offending task index and line number.

use crate::core::parallel::Task;
use crate::error::AgentXError;
use crate::Result;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// Delimiter opening each task block.
pub const TASK_DELIMITER: &str = "---TASK---";
/// Delimiter separating the header region from the body.
pub const CONTENT_DELIMITER: &str = "---CONTENT---";

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex must compile"));

/// Header keys the parser recognizes.
const KNOWN_KEYS: [&str; 10] = [
    "id",
    "workdir",
    "backend",
    "agent",
    "dependencies",
    "session_id",
    "skills",
    "worktree",
    "prompt_file",
    "reasoning_effort",
];

/// Parse batch input into a task list.
///
/// # Errors
///
/// Returns [`AgentXError::BatchSyntax`] with the task index and line number
/// when a block is missing its `id`, its `---CONTENT---` delimiter, or a
/// header line cannot be split on `:`; duplicate and malformed ids are
/// rejected the same way.
pub fn parse(input: &str) -> Result<Vec<Task>> {
    let lines: Vec<&str> = input.lines().collect();
    let mut tasks: Vec<Task> = Vec::new();
    let mut seen_ids: Vec<String> = Vec::new();

    let mut cursor = 0usize;
    // leading blank lines are tolerated; anything else before the first
    // delimiter is a structural error
    while cursor < lines.len() && lines[cursor].trim() != TASK_DELIMITER {
        if !lines[cursor].trim().is_empty() {
            return Err(AgentXError::batch_syntax(
                0,
                cursor + 1,
                format!("expected '{}' before task content", TASK_DELIMITER),
            ));
        }
        cursor += 1;
    }

    while cursor < lines.len() {
        debug_assert_eq!(lines[cursor].trim(), TASK_DELIMITER);
        let task_index = tasks.len();
        let block_start_line = cursor + 1;
        cursor += 1;

        let mut task = Task::default();
        let mut saw_content = false;

        // header region
        while cursor < lines.len() {
            let line = lines[cursor];
            let trimmed = line.trim();
            if trimmed == CONTENT_DELIMITER {
                saw_content = true;
                cursor += 1;
                break;
            }
            if trimmed == TASK_DELIMITER {
                break;
            }
            if trimmed.is_empty() {
                cursor += 1;
                continue;
            }
            let Some((key, value)) = trimmed.split_once(':') else {
                return Err(AgentXError::batch_syntax(
                    task_index,
                    cursor + 1,
                    format!("header line is not 'key: value': {}", trimmed),
                ));
            };
            apply_header(&mut task, key.trim(), value.trim(), task_index, cursor + 1)?;
            cursor += 1;
        }

        if !saw_content {
            return Err(AgentXError::batch_syntax(
                task_index,
                block_start_line,
                format!("missing '{}' delimiter", CONTENT_DELIMITER),
            ));
        }

        // body region
        let body_start = cursor;
        while cursor < lines.len() && lines[cursor].trim() != TASK_DELIMITER {
            cursor += 1;
        }
        task.prompt = lines[body_start..cursor].join("\n").trim().to_string();

        if task.id.is_empty() {
            return Err(AgentXError::batch_syntax(
                task_index,
                block_start_line,
                "missing required header: id",
            ));
        }
        if seen_ids.contains(&task.id) {
            return Err(AgentXError::batch_syntax(
                task_index,
                block_start_line,
                format!("duplicate task id: {}", task.id),
            ));
        }
        seen_ids.push(task.id.clone());
        tasks.push(task);
    }

    Ok(tasks)
}

/// Apply one recognized header to the task under construction.
fn apply_header(
    task: &mut Task,
    key: &str,
    value: &str,
    task_index: usize,
    line: usize,
) -> Result<()> {
    match key {
        "id" => {
            if !ID_PATTERN.is_match(value) {
                return Err(AgentXError::batch_syntax(
                    task_index,
                    line,
                    format!(
                        "task id may only contain alphanumerics, underscore, and hyphen: {}",
                        value
                    ),
                ));
            }
            task.id = value.to_string();
        }
        "workdir" => task.workdir = Some(PathBuf::from(value)),
        "backend" => task.backend = Some(value.to_string()),
        "agent" => task.agent = Some(value.to_string()),
        "dependencies" => task.dependencies = split_comma_list(value),
        "session_id" => task.session_id = Some(value.to_string()),
        "skills" => task.skills = Some(split_comma_list(value)),
        "worktree" => {
            task.worktree = match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    return Err(AgentXError::batch_syntax(
                        task_index,
                        line,
                        format!("worktree expects a boolean, got: {}", other),
                    ));
                }
            }
        }
        "prompt_file" => task.prompt_file = Some(PathBuf::from(value)),
        "reasoning_effort" => {
            crate::config::validator::validate_reasoning_effort(value).map_err(|_| {
                AgentXError::batch_syntax(
                    task_index,
                    line,
                    format!("reasoning_effort expects low, medium, or high, got: {}", value),
                )
            })?;
            task.reasoning_effort = Some(value.to_string());
        }
        unknown => {
            debug_assert!(!KNOWN_KEYS.contains(&unknown));
            warn!(
                "batch task {}: unknown header key '{}' discarded (line {})",
                task_index, unknown, line
            );
        }
    }
    Ok(())
}

/// Split a comma-separated header value, trimming whitespace and dropping
/// empty entries.
fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a task list back into canonical batch form.
///
/// Emits headers in a fixed order and only when set; parsing the output
/// yields the same task list (round-trip idempotence modulo whitespace).
pub fn serialize(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        out.push_str(TASK_DELIMITER);
        out.push('\n');
        out.push_str(&format!("id: {}\n", task.id));
        if let Some(workdir) = &task.workdir {
            out.push_str(&format!("workdir: {}\n", workdir.display()));
        }
        if let Some(backend) = &task.backend {
            out.push_str(&format!("backend: {}\n", backend));
        }
        if let Some(agent) = &task.agent {
            out.push_str(&format!("agent: {}\n", agent));
        }
        if !task.dependencies.is_empty() {
            out.push_str(&format!("dependencies: {}\n", task.dependencies.join(", ")));
        }
        if let Some(session_id) = &task.session_id {
            out.push_str(&format!("session_id: {}\n", session_id));
        }
        if let Some(skills) = &task.skills {
            out.push_str(&format!("skills: {}\n", skills.join(", ")));
        }
        if task.worktree {
            out.push_str("worktree: true\n");
        }
        if let Some(prompt_file) = &task.prompt_file {
            out.push_str(&format!("prompt_file: {}\n", prompt_file.display()));
        }
        if let Some(effort) = &task.reasoning_effort {
            out.push_str(&format!("reasoning_effort: {}\n", effort));
        }
        out.push_str(CONTENT_DELIMITER);
        out.push('\n');
        out.push_str(&task.prompt);
        out.push('\n');
    }
    out
}
