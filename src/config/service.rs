//! Configuration service system for dependency injection and test isolation.
//!
//! This module provides a clean abstraction for configuration management
//! that enables dependency injection and complete test isolation without
//! requiring unsafe code or global state resets.

use crate::config::{Config, EnvironmentProvider, SystemEnvironmentProvider};
use crate::{Result, error::AgentXError};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service trait for dependency injection.
///
/// This trait abstracts configuration loading and inspection, allowing
/// different implementations for production and testing environments.
pub trait ConfigService: Send + Sync {
    /// Get the current configuration.
    ///
    /// Returns the current [`Config`] instance loaded from the user config
    /// file, `AGENTX_*` environment variables, and defaults. May be cached.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or validation fails.
    fn get_config(&self) -> Result<Config>;

    /// Reload configuration from sources, discarding any cached values.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration reloading fails.
    fn reload(&self) -> Result<()>;

    /// Get the configuration file path consulted by this service.
    fn get_config_file_path(&self) -> Result<PathBuf>;
}

/// Production configuration service implementation.
///
/// This service loads configuration from multiple sources in order of
/// priority:
/// 1. `AGENTX_*` environment variables (highest priority)
/// 2. User configuration file (JSON)
/// 3. Built-in defaults (lowest priority)
///
/// Configuration is cached after first load for performance.
pub struct ProductionConfigService {
    config_path: PathBuf,
    cached_config: Arc<RwLock<Option<Config>>>,
    env_provider: Arc<dyn EnvironmentProvider>,
}

impl ProductionConfigService {
    /// Create a new production configuration service using the system
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration sources cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_env_provider(Arc::new(SystemEnvironmentProvider::new()))
    }

    /// Create a configuration service using the specified environment
    /// variable provider.
    pub fn with_env_provider(env_provider: Arc<dyn EnvironmentProvider>) -> Result<Self> {
        // A custom config path may be specified in the environment
        let config_path = if let Some(custom_path) = env_provider.get_var("AGENTX_CONFIG_PATH") {
            PathBuf::from(custom_path)
        } else {
            Self::user_config_path()
        };

        Ok(Self {
            config_path,
            cached_config: Arc::new(RwLock::new(None)),
            env_provider,
        })
    }

    /// Create a configuration service reading a specific file path.
    pub fn with_config_file(mut self, file_path: PathBuf) -> Self {
        self.config_path = file_path;
        self
    }

    /// Get the user configuration file path, typically
    /// `$CONFIG_DIR/agentx/config.json`.
    fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentx")
            .join("config.json")
    }

    /// Load and validate configuration from all sources.
    fn load_and_validate(&self) -> Result<Config> {
        debug!("ProductionConfigService: loading configuration from sources");

        let mut app_config = if self.config_path.exists() {
            // plain serde keeps preset names and env-variable keys exactly
            // as written
            let raw = std::fs::read_to_string(&self.config_path)?;
            let mut parsed: Config = serde_json::from_str(&raw).map_err(|e| {
                AgentXError::invalid_config(format!(
                    "Failed to parse {}: {}",
                    self.config_path.display(),
                    e
                ))
            })?;
            parsed.loaded_from = Some(self.config_path.clone());
            parsed
        } else {
            debug!(
                "ProductionConfigService: no config file at {}, using defaults",
                self.config_path.display()
            );
            Config::default()
        };

        self.apply_env_overrides(&mut app_config);
        drop_unknown_backend_presets(&mut app_config);

        // worker capacity is capped, never rejected
        if app_config.general.max_parallel_workers > crate::config::MAX_WORKER_CAP {
            warn!(
                "max_parallel_workers {} capped at {}",
                app_config.general.max_parallel_workers,
                crate::config::MAX_WORKER_CAP
            );
            app_config.general.max_parallel_workers = crate::config::MAX_WORKER_CAP;
        }

        crate::config::validator::validate_config(&app_config)?;

        debug!("ProductionConfigService: configuration loaded and validated");
        Ok(app_config)
    }

    /// Apply the documented `AGENTX_*` environment overrides.
    fn apply_env_overrides(&self, config: &mut Config) {
        if let Some(v) = self.env_provider.get_var("AGENTX_TIMEOUT") {
            match v.parse::<u64>() {
                Ok(ms) => config.general.timeout_ms = ms,
                Err(_) => warn!("Ignoring non-numeric AGENTX_TIMEOUT: {}", v),
            }
        }
        if let Some(v) = self.env_provider.get_var("AGENTX_MAX_PARALLEL_WORKERS") {
            match v.parse::<usize>() {
                Ok(n) => config.general.max_parallel_workers = n,
                Err(_) => warn!("Ignoring non-numeric AGENTX_MAX_PARALLEL_WORKERS: {}", v),
            }
        }
        if let Some(v) = self.env_provider.get_var("AGENTX_SKIP_PERMISSIONS") {
            config.general.skip_permissions = parse_env_bool(&v);
        }
        if let Some(v) = self.env_provider.get_var("AGENTX_FAIL_FAST") {
            config.general.fail_fast = parse_env_bool(&v);
        }
        if let Some(v) = self.env_provider.get_var("AGENTX_CODEX_BYPASS") {
            config.backends.codex.bypass_sandbox = parse_env_bool(&v);
        }
        if let Some(v) = self.env_provider.get_var("AGENTX_TMPDIR") {
            config.general.log_root = Some(PathBuf::from(v));
        }
    }
}

/// Interpret the usual truthy spellings of a boolean environment variable.
fn parse_env_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Remove agent presets that name a backend we do not know.
///
/// The preset file is shared across tool versions, so unknown backends are
/// a warning rather than a hard error.
fn drop_unknown_backend_presets(config: &mut Config) {
    config.agents.retain(|name, preset| {
        let keep = preset
            .backend
            .as_deref()
            .map(crate::services::backends::is_known_backend)
            .unwrap_or(true);
        if !keep {
            warn!(
                "Ignoring agent preset '{}': unknown backend '{}'",
                name,
                preset.backend.as_deref().unwrap_or_default()
            );
        }
        keep
    });
}

impl ConfigService for ProductionConfigService {
    fn get_config(&self) -> Result<Config> {
        {
            let cached = self
                .cached_config
                .read()
                .map_err(|_| AgentXError::invalid_config("config cache lock poisoned"))?;
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let config = self.load_and_validate()?;
        let mut cached = self
            .cached_config
            .write()
            .map_err(|_| AgentXError::invalid_config("config cache lock poisoned"))?;
        *cached = Some(config.clone());
        Ok(config)
    }

    fn reload(&self) -> Result<()> {
        let config = self.load_and_validate()?;
        let mut cached = self
            .cached_config
            .write()
            .map_err(|_| AgentXError::invalid_config("config cache lock poisoned"))?;
        *cached = Some(config);
        Ok(())
    }

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.config_path.clone())
    }
}

/// Test configuration service with a fixed in-memory configuration.
///
/// Never reads files or the environment, giving tests full control.
pub struct TestConfigService {
    config: RwLock<Config>,
}

impl TestConfigService {
    /// Create a test service around the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the held configuration.
    pub fn set_config(&self, config: Config) {
        *self.config.write().unwrap() = config;
    }
}

impl ConfigService for TestConfigService {
    fn get_config(&self) -> Result<Config> {
        Ok(self.config.read().unwrap().clone())
    }

    fn reload(&self) -> Result<()> {
        Ok(())
    }

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/nonexistent/test-config.json"))
    }
}

/// Builder for test configurations.
///
/// # Examples
///
/// ```rust
/// use agentx_cli::config::TestConfigBuilder;
///
/// let service = TestConfigBuilder::new()
///     .with_default_backend("claude")
///     .with_timeout_ms(500)
///     .build_service();
/// ```
#[derive(Default)]
pub struct TestConfigBuilder {
    config: Config,
}

impl TestConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the default backend.
    pub fn with_default_backend(mut self, backend: &str) -> Self {
        self.config.general.default_backend = backend.to_string();
        self
    }

    /// Set the per-task timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.general.timeout_ms = timeout_ms;
        self
    }

    /// Set the worker pool capacity.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.config.general.max_parallel_workers = workers;
        self
    }

    /// Enable or disable fail-fast batch scheduling.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.general.fail_fast = fail_fast;
        self
    }

    /// Point a backend at a specific executable (the stub-backend seam).
    pub fn with_backend_executable(mut self, backend: &str, executable: &str) -> Self {
        match backend {
            "codex" => self.config.backends.codex.executable = executable.to_string(),
            "claude" => self.config.backends.claude.executable = executable.to_string(),
            "gemini" => self.config.backends.gemini.executable = executable.to_string(),
            "opencode" => self.config.backends.opencode.executable = executable.to_string(),
            other => panic!("unknown backend in test builder: {}", other),
        }
        self
    }

    /// Register an agent preset.
    pub fn with_agent(mut self, name: &str, preset: crate::config::AgentPreset) -> Self {
        self.config.agents.insert(name.to_string(), preset);
        self
    }

    /// Set the skill byte budget.
    pub fn with_skill_budget(mut self, budget_bytes: usize) -> Self {
        self.config.skills.budget_bytes = budget_bytes;
        self
    }

    /// Point skill resolution at specific directories.
    pub fn with_skill_dirs(mut self, codex_dir: &Path, claude_dir: &Path) -> Self {
        self.config.skills.codex_dir = Some(codex_dir.to_path_buf());
        self.config.skills.claude_dir = Some(claude_dir.to_path_buf());
        self
    }

    /// Set the per-task log root.
    pub fn with_log_root(mut self, root: &Path) -> Self {
        self.config.general.log_root = Some(root.to_path_buf());
        self
    }

    /// Set the prompt-file allow-list roots.
    pub fn with_prompt_file_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.general.prompt_file_roots = roots;
        self
    }

    /// Build the configuration value.
    pub fn build_config(self) -> Config {
        self.config
    }

    /// Build a [`TestConfigService`] around the configuration.
    pub fn build_service(self) -> TestConfigService {
        TestConfigService::new(self.config)
    }
}
