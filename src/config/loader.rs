//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::load_balancer::Algorithm;

/// Error type for configuration loading.
#[derive(Debug, Error)]
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
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
///
/// An algorithm name that only resolves through the random fallback is kept
/// in `algorithm_fallback` so startup can report it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let value: toml::Value = toml::from_str(content)?;
    let fallback = value
        .get("algorithm")
        .and_then(toml::Value::as_str)
        .filter(|name| !Algorithm::is_known_name(name))
        .map(str::to_string);

    let mut config: ProxyConfig = value.try_into()?;
    config.algorithm_fallback = fallback;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_text() {
        let config = parse_config(
            r#"
            algorithm = "random"
            backends = ["http://localhost:9000"]
            "#,
        )
        .unwrap();
        assert_eq!(config.backends, vec!["http://localhost:9000"]);
    }

    #[test]
    fn reports_parse_errors() {
        let err = parse_config("backends = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reports_validation_errors_together() {
        let err = parse_config(
            r#"
            backends = ["ftp://x"]
            [health_check]
            timeout_secs = 0
            "#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed: "), "{}", msg);
        assert!(msg.contains("ftp"), "{}", msg);
        assert!(msg.contains("health_check.timeout_secs"), "{}", msg);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn keeps_unrecognized_algorithm_name() {
        let config = parse_config(
            r#"
            algorithm = "weighted"
            backends = ["http://localhost:9000"]
            "#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::Random);
        assert_eq!(config.algorithm_fallback.as_deref(), Some("weighted"));

        let config = parse_config(
            r#"
            algorithm = "LeastConn"
            backends = ["http://localhost:9000"]
            "#,
        )
        .unwrap();
        assert_eq!(config.algorithm, Algorithm::LeastConn);
        assert!(config.algorithm_fallback.is_none());

        let config = parse_config(r#"backends = ["http://localhost:9000"]"#).unwrap();
        assert_eq!(config.algorithm, Algorithm::RoundRobin);
        assert!(config.algorithm_fallback.is_none());
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("lb-proxy-config-{}.toml", std::process::id()));
        fs::write(&path, "algorithm = \"random\"\nbackends = [\"127.0.0.1:9001\"]\n").unwrap();
        let config = load_config(&path);
        let _ = fs::remove_file(&path);

        let config = config.unwrap();
        assert_eq!(config.algorithm, Algorithm::Random);
        assert_eq!(config.backends, vec!["127.0.0.1:9001"]);
    }
}
