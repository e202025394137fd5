// src/config/mod.rs
//! Configuration management module for AgentX.
//!
//! This module provides the configuration service system with dependency
//! injection support and the type definitions for the user agent-preset
//! file.
//!
//! # Key Components
//!
//! - [`Config`] - Main configuration structure containing all settings
//! - [`ConfigService`] - Service interface for configuration management
//! - [`ProductionConfigService`] - Production implementation with file I/O
//! - [`TestConfigService`] - Test implementation with controlled behavior
//! - [`TestConfigBuilder`] - Builder pattern for test configurations
//!
//! # Sources
//!
//! Configuration is layered from three sources, later sources winning:
//! built-in defaults, the user config file (JSON, typically
//! `$CONFIG_DIR/agentx/config.json`), and `AGENTX_*` environment variables.
//! Environment access goes through an injectable [`EnvironmentProvider`] so
//! tests never touch process state.
//!
//! # Examples
//!
//! ```rust
//! use agentx_cli::config::{Config, ConfigService, ProductionConfigService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config_service = ProductionConfigService::new()?;
//! let config = config_service.get_config()?;
//! println!("Default backend: {}", config.general.default_backend);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// Configuration service system
pub mod environment;
pub mod service;
pub mod validator;

pub use environment::{EnvironmentProvider, SystemEnvironmentProvider, TestEnvironmentProvider};
pub use service::{ConfigService, ProductionConfigService, TestConfigBuilder, TestConfigService};

// ============================================================================
// Configuration Type Definitions
// ============================================================================

/// Full application configuration for AgentX.
///
/// This struct aggregates general runtime options, the skill-injection
/// settings, per-backend configuration blocks, and the named agent presets.
///
/// # Examples
///
/// ```rust
/// use agentx_cli::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.general.default_backend, "codex");
/// assert_eq!(config.skills.budget_bytes, 16_000);
/// ```
///
/// # Serialization
///
/// This struct can be serialized to/from JSON for the user config file.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// General runtime options (default backend, timeout, worker limits).
    pub general: GeneralConfig,
    /// Skill resolution settings.
    pub skills: SkillsConfig,
    /// Per-backend configuration blocks.
    pub backends: BackendsConfig,
    /// Named agent presets merged into tasks on demand.
    pub agents: HashMap<String, AgentPreset>,
    /// Optional file path from which the configuration was loaded.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

/// General runtime options.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Backend used when neither the task nor its preset names one.
    pub default_backend: String,
    /// Model used when neither the task nor its preset names one.
    pub default_model: Option<String>,
    /// Per-task wall-clock timeout in milliseconds.
    pub timeout_ms: u64,
    /// Worker pool capacity for parallel batches. 0 means unbounded,
    /// which is still capped internally at [`MAX_WORKER_CAP`].
    pub max_parallel_workers: usize,
    /// Cancel not-yet-started tasks after the first terminal failure.
    pub fail_fast: bool,
    /// Pass each backend's permission-bypass flags.
    pub skip_permissions: bool,
    /// Directories from which `--prompt-file` paths may be loaded.
    pub prompt_file_roots: Vec<PathBuf>,
    /// Root directory for per-task logs. Defaults to the user cache dir.
    pub log_root: Option<PathBuf>,
}

/// Hard ceiling on concurrently running tasks, regardless of user input.
pub const MAX_WORKER_CAP: usize = 100;

impl Default for GeneralConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            default_backend: "codex".to_string(),
            default_model: None,
            timeout_ms: 7_200_000,
            max_parallel_workers: num_cpus::get(),
            fail_fast: false,
            skip_permissions: false,
            prompt_file_roots: vec![
                home.join(".claude"),
                home.join(".codex"),
                home.join(".agentx").join("agents"),
            ],
            log_root: None,
        }
    }
}

/// Skill resolution settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SkillsConfig {
    /// Total byte budget for injected skill blocks.
    pub budget_bytes: usize,
    /// Override for the Codex skills directory (default `~/.codex/skills`).
    pub codex_dir: Option<PathBuf>,
    /// Override for the Claude skills directory (default `~/.claude/skills`).
    pub claude_dir: Option<PathBuf>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            budget_bytes: 16_000,
            codex_dir: None,
            claude_dir: None,
        }
    }
}

/// Per-backend configuration blocks.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BackendsConfig {
    /// Codex backend settings.
    pub codex: CodexBackendConfig,
    /// Claude backend settings.
    pub claude: ClaudeBackendConfig,
    /// Gemini backend settings.
    pub gemini: GeminiBackendConfig,
    /// OpenCode backend settings.
    pub opencode: OpencodeBackendConfig,
}

/// Codex backend settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CodexBackendConfig {
    /// Executable name or path.
    pub executable: String,
    /// Add the bypass-approvals-and-sandbox flag in fresh sessions.
    pub bypass_sandbox: bool,
    /// Substring/regex denylist applied to stderr lines.
    pub stderr_filters: Vec<String>,
}

impl Default for CodexBackendConfig {
    fn default() -> Self {
        Self {
            executable: "codex".to_string(),
            bypass_sandbox: true,
            stderr_filters: Vec::new(),
        }
    }
}

/// Claude backend settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ClaudeBackendConfig {
    /// Executable name or path.
    pub executable: String,
    /// Injected into `ANTHROPIC_BASE_URL` of the child environment.
    pub base_url: Option<String>,
    /// Injected into `ANTHROPIC_API_KEY` of the child environment.
    pub api_key: Option<String>,
    /// Claude settings file consulted for model and env overrides
    /// (default `~/.claude/settings.json`).
    pub settings_file: Option<PathBuf>,
    /// Substring/regex denylist applied to stderr lines.
    pub stderr_filters: Vec<String>,
}

impl Default for ClaudeBackendConfig {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
            base_url: None,
            api_key: None,
            settings_file: None,
            stderr_filters: Vec::new(),
        }
    }
}

/// Gemini backend settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeminiBackendConfig {
    /// Executable name or path.
    pub executable: String,
    /// `.env` file consulted for API key, model, and auth mechanism
    /// (default `~/.gemini/.env`).
    pub env_file: Option<PathBuf>,
    /// Substring/regex denylist applied to stderr lines.
    pub stderr_filters: Vec<String>,
}

impl Default for GeminiBackendConfig {
    fn default() -> Self {
        Self {
            executable: "gemini".to_string(),
            env_file: None,
            stderr_filters: Vec::new(),
        }
    }
}

/// OpenCode backend settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OpencodeBackendConfig {
    /// Executable name or path.
    pub executable: String,
    /// Substring/regex denylist applied to stderr lines.
    pub stderr_filters: Vec<String>,
}

impl Default for OpencodeBackendConfig {
    fn default() -> Self {
        Self {
            executable: "opencode".to_string(),
            stderr_filters: Vec::new(),
        }
    }
}

/// A named bundle of task defaults loaded from user configuration.
///
/// Presets supply defaults for backend, model, prompt file, reasoning
/// effort, permission bypass, tool lists, and child environment variables.
/// Explicit task fields always take precedence over preset values.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AgentPreset {
    /// Backend this preset targets. Presets naming an unknown backend are
    /// ignored with a warning at load time.
    pub backend: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Prompt file whose contents wrap the task body.
    pub prompt_file: Option<PathBuf>,
    /// Reasoning effort: low, medium, or high.
    pub reasoning_effort: Option<String>,
    /// Pass the backend's permission-bypass flags.
    pub yolo: Option<bool>,
    /// Tools the backend may use.
    pub allowed_tools: Vec<String>,
    /// Tools the backend must not use.
    pub disallowed_tools: Vec<String>,
    /// Extra environment variables for the child process.
    pub env: HashMap<String, String>,
}
