//! Caddy admin sidecar library.
//!
//! Reads Caddy's live config into per-site summaries, reports certificate
//! expiry, and keeps dynamically registered services routed through Caddy
//! across restarts.

pub mod admin;
pub mod caddy;
pub mod certs;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod reconcile;
pub mod registry;

use std::sync::Arc;

pub use config::SidecarConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

use crate::admin::{setup_admin_router, AppState};
use crate::caddy::AdminApi;
use crate::certs::CertificateInventory;
use crate::reconcile::{Reconciler, ReplayPolicy};
use crate::registry::RegistryStore;

/// Build the reconciler over `admin` and the configured registry file.
pub fn build_reconciler<A: AdminApi>(config: &SidecarConfig, admin: A) -> Arc<Reconciler<A>> {
    let store = Arc::new(RegistryStore::new(&config.registry.services_file));
    Arc::new(Reconciler::new(
        Arc::new(admin),
        store,
        ReplayPolicy::from(&config.replay),
    ))
}

/// Assemble the API and its middleware stack.
pub fn build_server<A: AdminApi>(config: &SidecarConfig, reconciler: Arc<Reconciler<A>>) -> HttpServer {
    let state = AppState::new(
        reconciler,
        CertificateInventory::from_config(&config.certificates),
    );
    let api = setup_admin_router(state, config.admin.api_key.as_deref());
    HttpServer::new(&config.listener, api)
}
