//! Caddy integration subsystem.
//!
//! # Data Flow
//! ```text
//! Read path:
//!     client.rs (GET /config/)
//!     → model.rs (lenient typed ConfigTree)
//!     → sites.rs (flattened SiteRecord per host)
//!
//! Write path:
//!     ServiceDescriptor
//!     → route.rs (RouteFragment tagged "svc-<name>")
//!     → client.rs (DELETE /id/<id>, PUT .../routes/0)
//! ```
//!
//! # Design Decisions
//! - Handler chains decode by their `handler` discriminator into a closed
//!   enum with an explicit unrecognised variant
//! - Unreachable and rejected calls are distinct error kinds
//! - Every admin call carries a bounded timeout

pub mod client;
pub mod error;
pub mod model;
pub mod route;
pub mod sites;

pub use client::{AdminApi, CaddyClient};
pub use error::{AdminError, AdminResult};
pub use model::ConfigTree;
pub use route::{route_id, synthesize, RouteFragment};
pub use sites::{extract_sites, find_site, SiteKind, SiteRecord};
