//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sidecar.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the admin sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SidecarConfig {
    /// Listener configuration (bind address, TLS, CORS).
    pub listener: ListenerConfig,

    /// Caddy admin API connection settings.
    pub caddy: CaddyConfig,

    /// Durable service registry settings.
    pub registry: RegistryConfig,

    /// Certificate storage locations.
    pub certificates: CertificatesConfig,

    /// Startup replay settings.
    pub replay: ReplayConfig,

    /// API access settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8090").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Answer CORS preflight and add permissive CORS headers.
    pub cors_enabled: bool,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            tls: None,
            cors_enabled: true,
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Caddy admin API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaddyConfig {
    /// Admin endpoint address, e.g. "localhost:2019" or "caddy:2019".
    pub admin_address: String,

    /// HTTP server inside the Caddy config that receives service routes.
    pub server_name: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl CaddyConfig {
    /// Base URL of the admin endpoint.
    pub fn base_url(&self) -> String {
        if self.admin_address.starts_with("http://") || self.admin_address.starts_with("https://") {
            self.admin_address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.admin_address.trim_end_matches('/'))
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CaddyConfig {
    fn default() -> Self {
        Self {
            admin_address: "localhost:2019".to_string(),
            server_name: "srv0".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Durable service registry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON file holding registered services.
    pub services_file: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            services_file: "/app/data/services.json".to_string(),
        }
    }
}

/// Certificate storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificatesConfig {
    /// Caddy data directory (contains `certificates/<issuer>/<domain>/`).
    pub storage_root: String,

    /// Flat directory of externally issued PEM certificates.
    pub external_dir: Option<String>,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            storage_root: "/data/caddy".to_string(),
            external_dir: None,
        }
    }
}

/// Startup replay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replay the registry into Caddy when the sidecar starts.
    pub enabled: bool,

    /// Seconds between reachability probes.
    pub interval_secs: u64,

    /// Number of reachability probes before giving up.
    pub max_attempts: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 2,
            max_attempts: 15,
        }
    }
}

/// API access settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on `/api/*`. Unset means open access.
    pub api_key: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
