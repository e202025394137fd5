//! Configuration validation.
//!
//! Section-level checks applied after every load. Validation failures are
//! reported as [`AgentXError::InvalidConfig`] with the offending key.

use crate::config::Config;
use crate::error::AgentXError;
use crate::Result;

/// Reasoning effort values accepted by every backend adapter.
pub const REASONING_EFFORTS: [&str; 3] = ["low", "medium", "high"];

/// Validate a loaded configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if !crate::services::backends::is_known_backend(&config.general.default_backend) {
        return Err(AgentXError::invalid_config(format!(
            "general.default_backend: unknown backend '{}'",
            config.general.default_backend
        )));
    }

    if config.general.timeout_ms == 0 {
        return Err(AgentXError::invalid_config(
            "general.timeout_ms must be greater than zero",
        ));
    }

    if config.skills.budget_bytes == 0 {
        return Err(AgentXError::invalid_config(
            "skills.budget_bytes must be greater than zero",
        ));
    }

    for (name, preset) in &config.agents {
        if let Some(effort) = preset.reasoning_effort.as_deref() {
            validate_reasoning_effort(effort).map_err(|_| {
                AgentXError::invalid_config(format!(
                    "agents.{}.reasoning_effort: expected one of {:?}, got '{}'",
                    name, REASONING_EFFORTS, effort
                ))
            })?;
        }
    }

    Ok(())
}

/// Validate a reasoning effort value.
pub fn validate_reasoning_effort(effort: &str) -> Result<()> {
    if REASONING_EFFORTS.contains(&effort) {
        Ok(())
    } else {
        Err(AgentXError::invalid_config(format!(
            "reasoning effort must be one of {:?}, got '{}'",
            REASONING_EFFORTS, effort
        )))
    }
}
