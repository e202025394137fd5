//! Skill resolution and tech-stack auto-detection.
//!
//! Skills are reusable prompt fragments stored as `SKILL.md` files under
//! well-known directories. The resolver turns a list of skill names into a
//! single prompt section, subject to a total byte budget, and can infer
//! skill names from fingerprint files in the task's working directory.

use crate::config::Config;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static SKILL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex must compile"));

/// Fingerprint files and the skills they imply, checked in order.
const STACK_FINGERPRINTS: [(&str, &str); 7] = [
    ("go.mod", "go-practices"),
    ("Cargo.toml", "rust-practices"),
    ("package.json", "web-practices"),
    ("pyproject.toml", "python-practices"),
    ("requirements.txt", "python-practices"),
    ("pom.xml", "jvm-practices"),
    ("build.gradle", "jvm-practices"),
];

/// The resolved text for a single skill name.
#[derive(Debug, Clone)]
pub struct SkillBlock {
    /// Skill name as requested.
    pub name: String,
    /// File the body was loaded from.
    pub path: PathBuf,
    /// Wrapped block text, post-frontmatter, possibly truncated.
    pub text: String,
    /// Bytes this block contributed to the budget.
    pub bytes: usize,
    /// Whether the body was cut to fit the remaining budget.
    pub truncated: bool,
}

/// Resolves skill names into budgeted prompt fragments.
pub struct SkillResolver {
    codex_dir: PathBuf,
    claude_dir: PathBuf,
    budget_bytes: usize,
}

impl SkillResolver {
    /// Build a resolver from configuration, falling back to the standard
    /// `~/.codex/skills` and `~/.claude/skills` locations.
    pub fn from_config(config: &Config) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            codex_dir: config
                .skills
                .codex_dir
                .clone()
                .unwrap_or_else(|| home.join(".codex").join("skills")),
            claude_dir: config
                .skills
                .claude_dir
                .clone()
                .unwrap_or_else(|| home.join(".claude").join("skills")),
            budget_bytes: config.skills.budget_bytes,
        }
    }

    /// Resolve a list of skill names into blocks, in request order.
    ///
    /// Names outside the safe character class are dropped with a warning
    /// (this also guards against path traversal). Once the byte budget is
    /// exhausted, remaining skills are omitted rather than emptied.
    pub fn resolve(&self, names: &[String]) -> Vec<SkillBlock> {
        let mut blocks = Vec::new();
        let mut remaining = self.budget_bytes;

        for name in names {
            if !SKILL_NAME_PATTERN.is_match(name) {
                warn!("skipping skill with unsafe name: {:?}", name);
                continue;
            }
            let Some(path) = self.locate(name) else {
                warn!("skill not found under any skills directory: {}", name);
                continue;
            };
            let raw = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("failed to read skill {}: {}", path.display(), e);
                    continue;
                }
            };
            let body = strip_frontmatter(&raw);

            let overhead = wrap("", name).len();
            if remaining <= overhead {
                warn!("skill budget exhausted, omitting {} and the rest", name);
                break;
            }

            let available = remaining - overhead;
            let (body, truncated) = if body.len() > available {
                warn!(
                    "skill {} truncated from {} to {} bytes to fit the budget",
                    name,
                    body.len(),
                    available
                );
                (truncate_on_char_boundary(body, available), true)
            } else {
                (body, false)
            };

            let text = wrap(&body, name);
            remaining -= text.len();
            blocks.push(SkillBlock {
                name: name.clone(),
                path,
                bytes: text.len(),
                text,
                truncated,
            });
        }
        blocks
    }

    /// Render resolved blocks as the prompt section body, joined by blank
    /// lines in request order.
    pub fn render(blocks: &[SkillBlock]) -> String {
        blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Find the `SKILL.md` for a name, Codex directory first.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        for dir in [&self.codex_dir, &self.claude_dir] {
            let candidate = dir.join(name).join("SKILL.md");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Detect skill names from fingerprint files in the working directory.
    ///
    /// Only the directory's top level is considered. Results are
    /// deduplicated and keep the fingerprint table's order.
    pub fn detect_stack_skills(workdir: &Path) -> Vec<String> {
        let present: Vec<String> = WalkDir::new(workdir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();

        // fingerprint table order keeps the result stable
        let mut skills: Vec<String> = Vec::new();
        for (fingerprint, skill) in STACK_FINGERPRINTS {
            if present.iter().any(|f| f == fingerprint) && !skills.iter().any(|s| s == skill) {
                skills.push(skill.to_string());
            }
        }
        skills
    }
}

/// Wrap a skill body in its named tag.
fn wrap(body: &str, name: &str) -> String {
    format!("<skill name=\"{}\">\n{}\n</skill>", name, body)
}

/// Cut a string to at most `max` bytes without splitting a character.
fn truncate_on_char_boundary(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}

/// Strip one leading YAML front-matter block bracketed by `---` lines.
///
/// Stripping is idempotent: a body whose first line is not `---` is
/// returned unchanged.
pub fn strip_frontmatter(raw: &str) -> String {
    let mut lines = raw.lines();
    match lines.next() {
        Some(first) if first.trim() == "---" => {}
        _ => return raw.to_string(),
    }
    let mut rest: Vec<&str> = Vec::new();
    let mut closed = false;
    for line in lines {
        if !closed && line.trim() == "---" {
            closed = true;
            continue;
        }
        if closed {
            rest.push(line);
        }
    }
    if !closed {
        // unterminated front matter: treat the file as all body
        return raw.to_string();
    }
    rest.join("\n").trim_start_matches('\n').to_string()
}
