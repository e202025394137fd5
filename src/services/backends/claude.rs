//! Claude backend adapter.
//!
//! Runs `claude -p --output-format stream-json`. Permission skipping is
//! strictly opt-in for this backend: no bypass flag is emitted unless the
//! task or preset asked for it. The user's Claude settings file supplies a
//! fallback model and extra child environment, and the `backends.claude`
//! config block injects base-url and api-key into the standard Anthropic
//! variables.

use super::Invocation;
use crate::config::Config;
use crate::Result;
use log::warn;
use serde::Deserialize;
use std::path::PathBuf;

/// Flags added when permission-skipping is requested.
pub const YOLO_FLAGS: [&str; 1] = ["--dangerously-skip-permissions"];

/// Built-in stderr noise patterns.
pub const STDERR_FILTERS: &[&str] = &[
    r"\(node:\d+\)",
    r"ExperimentalWarning",
    r"punycode",
];

/// The subset of the Claude settings file we consume.
#[derive(Debug, Default, Deserialize)]
struct ClaudeSettings {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    env: std::collections::HashMap<String, String>,
}

fn settings_path(config: &Config) -> PathBuf {
    config.backends.claude.settings_file.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join("settings.json")
    })
}

/// Load the user's Claude settings, tolerating absence and malformation.
fn load_settings(config: &Config) -> ClaudeSettings {
    let path = settings_path(config);
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("ignoring malformed Claude settings {}: {}", path.display(), e);
            ClaudeSettings::default()
        }),
        Err(_) => ClaudeSettings::default(),
    }
}

/// Assemble argv for a Claude invocation.
pub fn argv(invocation: &Invocation, config: &Config) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
    ];

    if let Some(session_id) = &invocation.session_id {
        args.push("--resume".to_string());
        args.push(session_id.clone());
    }

    // explicit model wins over the settings-file fallback
    let model = invocation
        .model
        .clone()
        .or_else(|| load_settings(config).model);
    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model);
    }

    if invocation.skip_permissions {
        for flag in YOLO_FLAGS {
            args.push(flag.to_string());
        }
    }

    if !invocation.allowed_tools.is_empty() {
        args.push("--allowed-tools".to_string());
        args.push(invocation.allowed_tools.join(","));
    }
    if !invocation.disallowed_tools.is_empty() {
        args.push("--disallowed-tools".to_string());
        args.push(invocation.disallowed_tools.join(","));
    }

    if !invocation.prompt_via_stdin {
        args.push(invocation.prompt.clone());
    }
    args
}

/// Assemble child environment overrides for Claude.
pub fn env(_invocation: &Invocation, config: &Config) -> Result<Vec<(String, String)>> {
    let mut env: Vec<(String, String)> = Vec::new();

    let settings = load_settings(config);
    for (key, value) in settings.env {
        env.push((key, value));
    }

    if let Some(base_url) = &config.backends.claude.base_url {
        env.push(("ANTHROPIC_BASE_URL".to_string(), base_url.clone()));
    }
    if let Some(api_key) = &config.backends.claude.api_key {
        env.push(("ANTHROPIC_API_KEY".to_string(), api_key.clone()));
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_settings(json: &str) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, json).unwrap();
        let mut config = Config::default();
        config.backends.claude.settings_file = Some(path);
        (tmp, config)
    }

    #[test]
    fn test_permissions_prompt_by_default() {
        let mut config = Config::default();
        config.backends.claude.settings_file = Some(PathBuf::from("/nonexistent"));
        let invocation = Invocation {
            prompt: "p".to_string(),
            ..Default::default()
        };
        let args = argv(&invocation, &config);
        assert!(!args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn test_explicit_opt_in_adds_bypass() {
        let mut config = Config::default();
        config.backends.claude.settings_file = Some(PathBuf::from("/nonexistent"));
        let invocation = Invocation {
            prompt: "p".to_string(),
            skip_permissions: true,
            ..Default::default()
        };
        let args = argv(&invocation, &config);
        assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn test_settings_model_is_fallback_only() {
        let (_tmp, config) = config_with_settings(r#"{"model": "claude-opus-4"}"#);

        let fallback = argv(
            &Invocation {
                prompt: "p".to_string(),
                ..Default::default()
            },
            &config,
        );
        let pos = fallback.iter().position(|a| a == "--model").unwrap();
        assert_eq!(fallback[pos + 1], "claude-opus-4");

        let explicit = argv(
            &Invocation {
                prompt: "p".to_string(),
                model: Some("claude-sonnet-4".to_string()),
                ..Default::default()
            },
            &config,
        );
        let pos = explicit.iter().position(|a| a == "--model").unwrap();
        assert_eq!(explicit[pos + 1], "claude-sonnet-4");
    }

    #[test]
    fn test_settings_env_and_config_injection() {
        let (_tmp, mut config) =
            config_with_settings(r#"{"env": {"CLAUDE_CODE_MAX_OUTPUT_TOKENS": "64000"}}"#);
        config.backends.claude.base_url = Some("https://proxy.internal".to_string());
        config.backends.claude.api_key = Some("sk-test".to_string());

        let env = env(&Invocation::default(), &config).unwrap();
        assert!(env.contains(&(
            "CLAUDE_CODE_MAX_OUTPUT_TOKENS".to_string(),
            "64000".to_string()
        )));
        assert!(env.contains(&(
            "ANTHROPIC_BASE_URL".to_string(),
            "https://proxy.internal".to_string()
        )));
        assert!(env.contains(&("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string())));
    }

    #[test]
    fn test_malformed_settings_ignored() {
        let (_tmp, config) = config_with_settings("not json at all");
        let env = env(&Invocation::default(), &config).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_tool_lists_and_resume() {
        let mut config = Config::default();
        config.backends.claude.settings_file = Some(PathBuf::from("/nonexistent"));
        let invocation = Invocation {
            prompt: "p".to_string(),
            session_id: Some("c-3".to_string()),
            allowed_tools: vec!["Bash".to_string(), "Edit".to_string()],
            disallowed_tools: vec!["WebSearch".to_string()],
            ..Default::default()
        };
        let args = argv(&invocation, &config);
        let pos = args.iter().position(|a| a == "--resume").unwrap();
        assert_eq!(args[pos + 1], "c-3");
        let pos = args.iter().position(|a| a == "--allowed-tools").unwrap();
        assert_eq!(args[pos + 1], "Bash,Edit");
        let pos = args.iter().position(|a| a == "--disallowed-tools").unwrap();
        assert_eq!(args[pos + 1], "WebSearch");
    }

    #[test]
    fn test_stdin_mode_omits_positional_prompt() {
        let mut config = Config::default();
        config.backends.claude.settings_file = Some(PathBuf::from("/nonexistent"));
        let invocation = Invocation {
            prompt: "has 'quotes'".to_string(),
            prompt_via_stdin: true,
            ..Default::default()
        };
        let args = argv(&invocation, &config);
        assert!(!args.contains(&"has 'quotes'".to_string()));
    }
}
