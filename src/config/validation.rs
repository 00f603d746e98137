//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Route verbs and path templates are checked when the route table is
//!   built, registry agent address when the instance registers

use std::net::SocketAddr;

use axum::http::{HeaderName, Method};
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid host:port address")]
    InvalidAddress { field: String, value: String },
    #[error("{field}: '{value}' is not a valid URL")]
    InvalidUrl { field: String, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("cors.allow_methods: '{0}' is not an HTTP method")]
    InvalidCorsMethod(String),
    #[error("cors.allow_headers: '{0}' is not a header name")]
    InvalidCorsHeader(String),
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !matches!(split_host_port(&config.addr), Some((host, _)) if !host.is_empty()) {
        errors.push(ValidationError::InvalidAddress {
            field: "addr".to_string(),
            value: config.addr.clone(),
        });
    }

    check_url(&mut errors, "permission_addr", &config.permission_addr);
    check_url(&mut errors, "registry.addr", &config.registry.addr);
    if let Some(addr) = &config.notifier.addr {
        check_url(&mut errors, "notifier.addr", addr);
    }
    if let Some(addr) = &config.tracing.agent_addr {
        check_url(&mut errors, "tracing.agent_addr", addr);
    }

    for (i, service) in config.services.iter().enumerate() {
        if !matches!(split_host_port(&service.addr), Some((host, _)) if !host.is_empty()) {
            errors.push(ValidationError::InvalidAddress {
                field: format!("services[{i}].addr"),
                value: service.addr.clone(),
            });
        }
    }

    for (field, value) in [
        ("shutdown_timeout_secs", config.shutdown_timeout_secs),
        ("authorization.timeout_secs", config.authorization.timeout_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("max_body_size", config.max_body_size as u64),
        ("listener.max_connections", config.listener.max_connections as u64),
        ("registry.check_interval_secs", config.registry.check_interval_secs),
        ("registry.check_timeout_secs", config.registry.check_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.registry.service_family_name.is_empty() {
        errors.push(ValidationError::Empty {
            field: "registry.service_family_name",
        });
    }

    for method in &config.cors.allow_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidCorsMethod(method.clone()));
        }
    }
    for header in &config.cors.allow_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidCorsHeader(header.clone()));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "observability.metrics_address".to_string(),
                value: addr.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if base_url(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Parse a service base URL, defaulting to `http` when no scheme is given.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{raw}"))
    }
}

/// Split "host:port" (or "[v6]:port") into its parts.
pub fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        None if host.contains(':') => return None,
        None => host,
    };
    Some((host, port))
}
