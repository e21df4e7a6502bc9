//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, known log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;
use crate::observability::logging::parse_level;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = &config.service.name;
    if name.is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    } else if name.chars().any(|c| c.is_whitespace() || c == '.') {
        errors.push(ValidationError::new(
            "service.name",
            "must not contain whitespace or '.'",
        ));
    }

    if config.http.enabled {
        if config.http.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "http.bind_address",
                format!("invalid socket address {:?}", config.http.bind_address),
            ));
        }
        if config.http.request_timeout_secs == 0 {
            errors.push(ValidationError::new("http.request_timeout_secs", "must be > 0"));
        }
        if config.http.request_body_limit == 0 {
            errors.push(ValidationError::new("http.request_body_limit", "must be > 0"));
        }
    }

    if config.bus.request_timeout_ms == 0 {
        errors.push(ValidationError::new("bus.request_timeout_ms", "must be > 0"));
    }

    let obs = &config.observability;
    if parse_level(&obs.log_level).is_none() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", obs.metrics_address),
        ));
    }
    if let Some(endpoint) = &obs.otlp_endpoint {
        if url::Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(
                "observability.otlp_endpoint",
                format!("invalid URL {:?}", endpoint),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.service.name = String::new();
        config.http.request_timeout_secs = 0;
        config.observability.log_level = "loud".into();
        config.observability.otlp_endpoint = Some("not a url".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "service.name",
                "http.request_timeout_secs",
                "observability.log_level",
                "observability.otlp_endpoint",
            ]
        );
    }

    #[test]
    fn test_disabled_http_skips_checks() {
        let mut config = ServiceConfig::default();
        config.http.enabled = false;
        config.http.bind_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}
