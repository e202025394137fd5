//! Backend adapter layer.
//!
//! Maps a merged task invocation to a concrete argv/env/parser triple for
//! one of the supported AI coding CLIs. Backends are tagged variants with
//! an identical interface shape: each module supplies argv assembly, env
//! assembly, a yolo-flag table, and default stderr filters; this module
//! dispatches over [`BackendKind`].
//!
//! # Modules
//!
//! - `codex` - default backend, JSON-line events
//! - `claude` - Claude Code, stream-json events, settings-file merging
//! - `gemini` - Gemini CLI, `.env` forwarding
//! - `opencode` - minimal adapter

use crate::config::Config;
use crate::core::events::ParserStyle;
use crate::error::AgentXError;
use crate::Result;
use regex::Regex;
use std::fmt;

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod opencode;

/// The supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI Codex CLI (the default).
    Codex,
    /// Claude Code CLI.
    Claude,
    /// Gemini CLI.
    Gemini,
    /// OpenCode CLI.
    Opencode,
}

impl BackendKind {
    /// Parse a backend selector.
    ///
    /// # Errors
    ///
    /// Unknown names fail with [`AgentXError::InvalidConfig`] at adapter
    /// resolution time.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "codex" => Ok(Self::Codex),
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "opencode" => Ok(Self::Opencode),
            other => Err(AgentXError::invalid_config(format!(
                "unknown backend: {}",
                other
            ))),
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Opencode => "opencode",
        }
    }

    /// Stream dialect this backend emits.
    pub fn parser_style(&self) -> ParserStyle {
        match self {
            Self::Codex => ParserStyle::Codex,
            Self::Claude => ParserStyle::Claude,
            Self::Gemini => ParserStyle::Gemini,
            Self::Opencode => ParserStyle::Opencode,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a backend selector names a supported backend.
pub fn is_known_backend(name: &str) -> bool {
    BackendKind::parse(name).is_ok()
}

/// A task's merged launch parameters, as the adapters see them.
///
/// Preset merging and prompt assembly happen upstream in the runner; by the
/// time an adapter runs, every field is final.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Model override, if any.
    pub model: Option<String>,
    /// Session to resume instead of starting fresh.
    pub session_id: Option<String>,
    /// Pass the backend's permission-bypass flags.
    pub skip_permissions: bool,
    /// Reasoning effort: low, medium, or high.
    pub reasoning_effort: Option<String>,
    /// Tools the backend may use.
    pub allowed_tools: Vec<String>,
    /// Tools the backend must not use.
    pub disallowed_tools: Vec<String>,
    /// Deliver the prompt on stdin instead of as the final argv element.
    pub prompt_via_stdin: bool,
    /// The fully assembled prompt.
    pub prompt: String,
    /// Extra child environment from the agent preset.
    pub preset_env: Vec<(String, String)>,
}

/// A resolved backend: executable, dispatchers, and constant tables.
#[derive(Clone)]
pub struct BackendSpec {
    /// Which backend this is.
    pub kind: BackendKind,
    /// Executable name or path, from configuration.
    pub program: String,
    /// Stream dialect for the parser.
    pub parser_style: ParserStyle,
    /// Compiled stderr denylist.
    pub stderr_filters: Vec<Regex>,
}

impl BackendSpec {
    /// Resolve a backend selector against the configuration.
    pub fn resolve(name: &str, config: &Config) -> Result<Self> {
        let kind = BackendKind::parse(name)?;
        let (program, extra_filters): (String, &[String]) = match kind {
            BackendKind::Codex => (
                config.backends.codex.executable.clone(),
                &config.backends.codex.stderr_filters,
            ),
            BackendKind::Claude => (
                config.backends.claude.executable.clone(),
                &config.backends.claude.stderr_filters,
            ),
            BackendKind::Gemini => (
                config.backends.gemini.executable.clone(),
                &config.backends.gemini.stderr_filters,
            ),
            BackendKind::Opencode => (
                config.backends.opencode.executable.clone(),
                &config.backends.opencode.stderr_filters,
            ),
        };

        let builtin: &[&str] = match kind {
            BackendKind::Codex => codex::STDERR_FILTERS,
            BackendKind::Claude => claude::STDERR_FILTERS,
            BackendKind::Gemini => gemini::STDERR_FILTERS,
            BackendKind::Opencode => opencode::STDERR_FILTERS,
        };

        let mut stderr_filters = Vec::new();
        for pattern in builtin
            .iter()
            .map(|s| s.to_string())
            .chain(extra_filters.iter().cloned())
        {
            // config-supplied entries may be plain substrings; fall back to
            // a literal match when the pattern does not compile
            let regex = Regex::new(&pattern)
                .or_else(|_| Regex::new(&regex::escape(&pattern)))
                .map_err(|e| {
                    AgentXError::invalid_config(format!(
                        "bad stderr filter '{}': {}",
                        pattern, e
                    ))
                })?;
            stderr_filters.push(regex);
        }

        Ok(Self {
            kind,
            program,
            parser_style: kind.parser_style(),
            stderr_filters,
        })
    }

    /// Assemble the child argv (without the program itself).
    pub fn assemble_argv(&self, invocation: &Invocation, config: &Config) -> Vec<String> {
        match self.kind {
            BackendKind::Codex => codex::argv(invocation, config),
            BackendKind::Claude => claude::argv(invocation, config),
            BackendKind::Gemini => gemini::argv(invocation),
            BackendKind::Opencode => opencode::argv(invocation),
        }
    }

    /// Assemble the child environment overrides.
    pub fn assemble_env(&self, invocation: &Invocation, config: &Config) -> Result<Vec<(String, String)>> {
        let mut env = match self.kind {
            BackendKind::Codex => codex::env(invocation),
            BackendKind::Claude => claude::env(invocation, config)?,
            BackendKind::Gemini => gemini::env(invocation, config)?,
            BackendKind::Opencode => opencode::env(invocation),
        };
        // preset env lands last so operators can override adapter defaults
        env.extend(invocation.preset_env.iter().cloned());
        Ok(env)
    }

    /// Whether a stderr line is denylisted noise.
    pub fn stderr_filtered(&self, line: &str) -> bool {
        self.stderr_filters.iter().any(|re| re.is_match(line))
    }
}
