//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
addr = "0.0.0.0:8080"
permission_addr = "http://permissions:8000"

[[proxy_services]]
addr = "svc-a:9000"
endpoints = [
    { uri = "/widgets", method = "GET" },
    { uri = "/widgets/{id}", method = "DELETE" },
]

[consul]
addr = "http://consul:8500"
agent_addr = "10.0.0.5:8080"
service_family_name = "gateway"

[logger]
level = "debug"
"#;

    #[test]
    fn parses_legacy_key_names() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].endpoints[1].method, "DELETE");
        assert_eq!(config.registry.agent_addr, "10.0.0.5:8080");
        assert_eq!(config.logger.level, "debug");
        // Untouched sections keep their defaults.
        assert_eq!(config.registry.check_interval_secs, 5);
        assert_eq!(config.shutdown_timeout_secs, 5);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = parse_config("addr = \"nowhere\"\nshutdown_timeout_secs = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn surfaces_parse_errors() {
        assert!(matches!(parse_config("addr = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("gateway-config-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, SAMPLE).unwrap();
        let config = load_config(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.permission_addr, "http://permissions:8000");

        assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
    }
}
