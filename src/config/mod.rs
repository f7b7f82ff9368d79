//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flags / env vars (ConfigOverrides)
//!     → validation.rs (semantic checks)
//!     → SidecarConfig (validated, immutable)
//!     → each subsystem receives its own section at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::{
    AdminConfig, CaddyConfig, CertificatesConfig, ListenerConfig, ObservabilityConfig,
    RegistryConfig, ReplayConfig, SidecarConfig, TlsConfig,
};
