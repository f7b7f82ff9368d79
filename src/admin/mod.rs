//! Admin HTTP API.
//!
//! # Data Flow
//! ```text
//! /api/* request
//!     → auth.rs (bearer key, only when configured)
//!     → handlers.rs
//!         → sites:    live config → site extraction
//!         → certs:    certificate inventory
//!         → services: reconciler (registry + live routes)
//!     → error.rs (failures as {"error": ...} with a mapped status)
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::caddy::AdminApi;
use self::auth::{admin_auth_middleware, ApiKey};
use self::handlers::*;

pub use error::ApiError;
pub use state::AppState;

pub fn setup_admin_router<A: AdminApi>(state: AppState<A>, api_key: Option<&str>) -> Router {
    let router = Router::new()
        .route("/api/status", get(get_status::<A>))
        .route("/api/sites", get(list_sites::<A>))
        .route("/api/sites/{domain}", get(get_site::<A>))
        .route("/api/certs", get(list_certs::<A>))
        .route(
            "/api/services",
            get(list_services::<A>).post(register_service::<A>),
        )
        .route(
            "/api/services/sync",
            post(sync_services::<A>).delete(deregister_service_named_sync::<A>),
        )
        .route("/api/services/{name}", delete(deregister_service::<A>))
        .with_state(state);

    match api_key {
        Some(key) => router.layer(middleware::from_fn_with_state(
            ApiKey::new(key),
            admin_auth_middleware,
        )),
        None => router,
    }
}
