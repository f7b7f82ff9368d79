//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Registration request
//!     → descriptor.rs (validate before any side effect)
//!     → store.rs (serialized load-modify-save, atomic rename)
//!     → services.json (single source of truth for desired state)
//! ```
//!
//! # Design Decisions
//! - Whole-file snapshots; no partial in-place writes
//! - Readers share a lock, writers hold it exclusively
//! - Missing file is an empty registry

pub mod descriptor;
pub mod store;

pub use descriptor::{DescriptorError, ServiceDescriptor};
pub use store::{RegistryError, RegistryResult, RegistryStore};
