//! Read-only configuration inspection.

use crate::cli::ConfigArgs;
use crate::config::ConfigService;
use crate::error::AgentXError;
use crate::Result;

/// Execute the `config` subcommand.
pub fn execute(args: ConfigArgs, config_service: &dyn ConfigService) -> Result<i32> {
    if args.path {
        println!("{}", config_service.get_config_file_path()?.display());
        return Ok(0);
    }

    let config = config_service.get_config()?;
    let value = serde_json::to_value(&config)?;

    match &args.key {
        Some(key) => {
            let mut current = &value;
            for part in key.split('.') {
                current = current.get(part).ok_or_else(|| {
                    AgentXError::invalid_config(format!("unknown configuration key: {}", key))
                })?;
            }
            match current {
                serde_json::Value::String(s) => println!("{}", s),
                other => println!("{}", other),
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigArgs;
    use crate::config::TestConfigBuilder;

    #[test]
    fn test_lookup_known_key() {
        let service = TestConfigBuilder::new()
            .with_default_backend("gemini")
            .build_service();
        let args = ConfigArgs {
            key: Some("general.default_backend".to_string()),
            ..Default::default()
        };
        assert_eq!(execute(args, &service).unwrap(), 0);
    }

    #[test]
    fn test_unknown_key_is_invalid_config() {
        let service = TestConfigBuilder::new().build_service();
        let args = ConfigArgs {
            key: Some("general.nope".to_string()),
            ..Default::default()
        };
        let err = execute(args, &service).unwrap_err();
        assert!(err.to_string().contains("unknown configuration key"));
    }
}
