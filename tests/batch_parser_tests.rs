//! Batch grammar integration tests.

mod common;

use agentx_cli::core::batch;
use agentx_cli::error::AgentXError;
use common::batch_input;
use test_case::test_case;

#[test]
fn test_five_task_pipeline_document() {
    let input = batch_input(&[
        ("id: fmt", "Run the formatter."),
        ("id: lint\ndependencies: fmt", "Run the linter."),
        (
            "id: build\ndependencies: fmt\nbackend: codex\nreasoning_effort: low",
            "Build the project.",
        ),
        (
            "id: test\ndependencies: build, lint\nskills: rust-practices",
            "Run the tests.\n\nFix any failures you find.",
        ),
        (
            "id: review\ndependencies: test\nbackend: claude\nagent: reviewer\nworktree: true",
            "Review the changes.",
        ),
    ]);
    let tasks = batch::parse(&input).unwrap();
    assert_eq!(tasks.len(), 5);
    assert_eq!(tasks[3].dependencies, vec!["build", "lint"]);
    assert!(tasks[3].prompt.contains("Fix any failures"));
    assert_eq!(tasks[4].agent.as_deref(), Some("reviewer"));
    assert!(tasks[4].worktree);
}

#[test]
fn test_round_trip_reaches_fixed_point() {
    let input = batch_input(&[
        ("id: a\nbackend: gemini\nskills: go-practices, web-practices", "alpha"),
        ("id: b\ndependencies: a\nsession_id: s-1", "beta\n\ngamma"),
    ]);
    let first = batch::parse(&input).unwrap();
    let canonical = batch::serialize(&first);
    let second = batch::parse(&canonical).unwrap();
    // canonical form is a fixed point of parse-then-serialize
    assert_eq!(batch::serialize(&second), canonical);
    assert_eq!(second.len(), first.len());
    assert_eq!(second[1].session_id.as_deref(), Some("s-1"));
}

#[test_case("true", true; "lowercase true")]
#[test_case("1", true; "numeric true")]
#[test_case("Yes", true; "capitalized yes")]
#[test_case("false", false; "lowercase false")]
#[test_case("0", false; "numeric false")]
#[test_case("off", false; "off spelling")]
fn test_worktree_boolean_spellings(spelling: &str, expected: bool) {
    let input = format!(
        "---TASK---\nid: a\nworktree: {}\n---CONTENT---\nbody\n",
        spelling
    );
    let tasks = batch::parse(&input).unwrap();
    assert_eq!(tasks[0].worktree, expected);
}

#[test]
fn test_error_location_points_at_bad_line() {
    // the malformed header sits on line 7, in the second block
    let input = "\
---TASK---
id: a
---CONTENT---
body
---TASK---
id: b
this has no colon
---CONTENT---
body
";
    let err = batch::parse(input).unwrap_err();
    match err {
        AgentXError::BatchSyntax {
            task_index, line, ..
        } => {
            assert_eq!(task_index, 1);
            assert_eq!(line, 7);
        }
        other => panic!("expected BatchSyntax, got {}", other),
    }
}

#[test]
fn test_crlf_tolerated_via_trim() {
    let input = "---TASK---\r\nid: a\r\n---CONTENT---\r\nbody line\r\n";
    let tasks = batch::parse(input).unwrap();
    assert_eq!(tasks[0].id, "a");
    assert_eq!(tasks[0].prompt.trim(), "body line");
}
