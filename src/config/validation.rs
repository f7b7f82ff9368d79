//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All problems are
//! collected so an operator sees every mistake in one pass.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::SidecarConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
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

/// Validate a parsed configuration.
pub fn validate_config(config: &SidecarConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    if config.caddy.admin_address.trim().is_empty() {
        errors.push(ValidationError::new("caddy.admin_address", "must not be empty"));
    } else if let Err(e) = url::Url::parse(&config.caddy.base_url()) {
        errors.push(ValidationError::new(
            "caddy.admin_address",
            format!("'{}' does not form a valid URL: {}", config.caddy.admin_address, e),
        ));
    }
    if config.caddy.server_name.trim().is_empty() {
        errors.push(ValidationError::new("caddy.server_name", "must not be empty"));
    }
    if config.caddy.timeout_secs == 0 {
        errors.push(ValidationError::new("caddy.timeout_secs", "must be > 0"));
    }

    if config.registry.services_file.trim().is_empty() {
        errors.push(ValidationError::new("registry.services_file", "must not be empty"));
    }

    if config.replay.enabled {
        if config.replay.max_attempts == 0 {
            errors.push(ValidationError::new("replay.max_attempts", "must be > 0"));
        }
        if config.replay.interval_secs == 0 {
            errors.push(ValidationError::new("replay.interval_secs", "must be > 0"));
        }
    }

    if let Some(key) = &config.admin.api_key {
        if key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be blank when set"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
