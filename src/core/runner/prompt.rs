//! Final prompt assembly and the stdin-vs-argv heuristic.

use crate::config::Config;
use crate::core::parallel::Task;
use crate::core::skills::{SkillResolver, SkillBlock};
use crate::error::AgentXError;
use crate::Result;
use log::debug;
use std::path::Path;

/// Prompts longer than this always travel via stdin.
pub const STDIN_LENGTH_THRESHOLD: usize = 8 * 1024;

/// Characters that force stdin delivery.
///
/// Any of these in an argv element is a shell-escaping hazard somewhere
/// down the line, even though we never spawn through a shell ourselves.
const STDIN_TRIGGER_CHARS: [char; 6] = ['\n', '\\', '"', '\'', '`', '$'];

/// Decide whether the prompt must be passed on standard input.
pub fn needs_stdin(prompt: &str) -> bool {
    prompt.len() > STDIN_LENGTH_THRESHOLD
        || prompt.chars().any(|c| STDIN_TRIGGER_CHARS.contains(&c))
}

/// Assemble the final prompt for a task.
///
/// Starts from the body, wraps it with the agent prompt file when one is
/// supplied, and appends the skills section (explicit skills, or stack
/// auto-detection against `workdir` when the task requests none).
pub fn assemble(
    task: &Task,
    prompt_file: Option<&Path>,
    workdir: &Path,
    config: &Config,
) -> Result<String> {
    let mut prompt = task.prompt.clone();

    if let Some(path) = prompt_file {
        let contents = read_prompt_file(path, config)?;
        prompt = format!("<agent-prompt>{}</agent-prompt>\n\n{}", contents, prompt);
    }

    let skill_names: Vec<String> = match &task.skills {
        Some(explicit) => explicit.clone(),
        None => SkillResolver::detect_stack_skills(workdir),
    };
    if !skill_names.is_empty() {
        let resolver = SkillResolver::from_config(config);
        let blocks: Vec<SkillBlock> = resolver.resolve(&skill_names);
        if !blocks.is_empty() {
            debug!(
                "task {}: injecting {} skill block(s)",
                task.id,
                blocks.len()
            );
            prompt.push_str("\n\n# Domain Best Practices\n\n");
            prompt.push_str(&SkillResolver::render(&blocks));
        }
    }

    Ok(prompt)
}

/// Read an agent prompt file, enforcing the directory allow-list.
///
/// Paths outside `general.prompt_file_roots` are rejected so a batch file
/// cannot exfiltrate arbitrary files into a backend prompt.
fn read_prompt_file(path: &Path, config: &Config) -> Result<String> {
    let resolved = path.canonicalize().map_err(|_| {
        AgentXError::precondition_failed(format!("prompt file not found: {}", path.display()))
    })?;

    let allowed = config.general.prompt_file_roots.iter().any(|root| {
        root.canonicalize()
            .map(|root| resolved.starts_with(root))
            .unwrap_or(false)
    });
    if !allowed {
        return Err(AgentXError::precondition_failed(format!(
            "prompt file outside the allowed directories: {}",
            resolved.display()
        )));
    }

    Ok(std::fs::read_to_string(&resolved)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestConfigBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_plain_short_prompt_uses_argv() {
        assert!(!needs_stdin("fix the bug in parser.rs"));
    }

    #[rstest::rstest]
    #[case("line\nbreak")]
    #[case("back\\slash")]
    #[case("double \" quote")]
    #[case("single ' quote")]
    #[case("back`tick")]
    #[case("dollar $VAR")]
    fn test_special_characters_force_stdin(#[case] prompt: &str) {
        assert!(needs_stdin(prompt), "expected stdin for {:?}", prompt);
    }

    #[test]
    fn test_long_prompt_forces_stdin() {
        let long = "a".repeat(STDIN_LENGTH_THRESHOLD + 1);
        assert!(needs_stdin(&long));
        let fits = "a".repeat(STDIN_LENGTH_THRESHOLD);
        assert!(!needs_stdin(&fits));
    }

    #[test]
    fn test_assemble_wraps_agent_prompt() {
        let tmp = TempDir::new().unwrap();
        let prompt_path = tmp.path().join("persona.md");
        std::fs::write(&prompt_path, "You review Rust code.").unwrap();
        let config = TestConfigBuilder::new()
            .with_prompt_file_roots(vec![tmp.path().to_path_buf()])
            .build_config();

        let task = Task {
            skills: Some(Vec::new()),
            ..Task::new("t", "Check this diff.")
        };
        let prompt = assemble(&task, Some(&prompt_path), tmp.path(), &config).unwrap();
        assert_eq!(
            prompt,
            "<agent-prompt>You review Rust code.</agent-prompt>\n\nCheck this diff."
        );
    }

    #[test]
    fn test_prompt_file_outside_roots_rejected() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let prompt_path = outside.path().join("sneaky.md");
        std::fs::write(&prompt_path, "boo").unwrap();
        let config = TestConfigBuilder::new()
            .with_prompt_file_roots(vec![tmp.path().to_path_buf()])
            .build_config();

        let task = Task::new("t", "body");
        let err = assemble(&task, Some(&prompt_path), tmp.path(), &config).unwrap_err();
        assert!(matches!(err, AgentXError::PreconditionFailed { .. }));
        assert!(err.to_string().contains("outside the allowed directories"));
    }

    #[test]
    fn test_missing_prompt_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = TestConfigBuilder::new()
            .with_prompt_file_roots(vec![tmp.path().to_path_buf()])
            .build_config();
        let task = Task::new("t", "body");
        let missing = tmp.path().join("absent.md");
        let err = assemble(&task, Some(&missing), tmp.path(), &config).unwrap_err();
        assert!(matches!(err, AgentXError::PreconditionFailed { .. }));
    }

    #[test]
    fn test_explicit_skills_appended() {
        let tmp = TempDir::new().unwrap();
        let codex = tmp.path().join("codex-skills");
        let skill_dir = codex.join("rust-practices");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "Use clippy.").unwrap();
        let claude = tmp.path().join("claude-skills");
        let config = TestConfigBuilder::new()
            .with_skill_dirs(&codex, &claude)
            .build_config();

        let task = Task {
            skills: Some(vec!["rust-practices".to_string()]),
            ..Task::new("t", "body")
        };
        let prompt = assemble(&task, None, tmp.path(), &config).unwrap();
        assert!(prompt.contains("# Domain Best Practices"));
        assert!(prompt.contains("<skill name=\"rust-practices\">"));
        assert!(prompt.contains("Use clippy."));
    }

    #[test]
    fn test_auto_detection_when_no_explicit_skills() {
        let tmp = TempDir::new().unwrap();
        let workdir = tmp.path().join("project");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::write(workdir.join("go.mod"), "module demo").unwrap();

        let codex = tmp.path().join("codex-skills");
        let skill_dir = codex.join("go-practices");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "Run gofmt.").unwrap();
        let claude = tmp.path().join("claude-skills");
        let config = TestConfigBuilder::new()
            .with_skill_dirs(&codex, &claude)
            .build_config();

        let task = Task::new("t", "body"); // skills: None => auto-detect
        let prompt = assemble(&task, None, &workdir, &config).unwrap();
        assert!(prompt.contains("<skill name=\"go-practices\">"));

        // an explicitly empty skill list disables injection
        let task = Task {
            skills: Some(Vec::new()),
            ..Task::new("t", "body")
        };
        let prompt = assemble(&task, None, &workdir, &config).unwrap();
        assert!(!prompt.contains("Domain Best Practices"));
    }
}
