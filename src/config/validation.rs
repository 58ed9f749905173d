//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses up front so startup fails clearly
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::{parse_backend_url, BackendError};

/// A single semantic problem in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{field}: '{value}' is not a valid socket address")]
    BadSocketAddr { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("health_check.path '{0}' must start with '/'")]
    BadHealthPath(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingApiKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for address in &config.backends {
        if let Err(e) = parse_backend_url(address) {
            errors.push(e.into());
        }
    }

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::Zero("health_check.interval_secs"));
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_secs"));
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::BadHealthPath(hc.path.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadSocketAddr {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        ProxyConfig {
            backends: vec!["http://127.0.0.1:9000".into(), "127.0.0.1:9001".into()],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn rejects_empty_backends() {
        let config = ProxyConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::NoBackends));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.backends.push("https://secure:443".into());
        config.listener.bind_address = "nope".into();
        config.health_check.interval_secs = 0;
        config.health_check.path = "health".into();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{:?}", errors);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Backend(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingApiKey)));
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_err());

        config.observability.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
