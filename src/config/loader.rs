//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SidecarConfig;
use crate::config::validation::{validate_config, ValidationError};

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

/// Values that take precedence over the config file.
///
/// Populated from command-line flags or their environment variables.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub admin_address: Option<String>,
    pub bind_address: Option<String>,
    pub storage_root: Option<String>,
    pub external_cert_dir: Option<String>,
    pub services_file: Option<String>,
}

impl ConfigOverrides {
    /// Apply every set override to `config`. Empty strings are ignored.
    pub fn apply(self, config: &mut SidecarConfig) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                *target = v;
            }
        }

        set(&mut config.caddy.admin_address, self.admin_address);
        // ":8090" means every interface.
        let bind_address = self.bind_address.map(|addr| match addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => addr,
        });
        set(&mut config.listener.bind_address, bind_address);
        set(&mut config.certificates.storage_root, self.storage_root);
        set(&mut config.registry.services_file, self.services_file);
        if let Some(dir) = self.external_cert_dir.filter(|v| !v.is_empty()) {
            config.certificates.external_dir = Some(dir);
        }
    }
}

/// Parse a TOML config file. Validation waits until overrides are applied.
pub fn load_config(path: &Path) -> Result<SidecarConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Resolve the effective configuration: optional file, then overrides, then validation.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<SidecarConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => SidecarConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
