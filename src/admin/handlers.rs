use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::error::ApiError;
use crate::admin::state::AppState;
use crate::caddy::{extract_sites, find_site, AdminApi, AdminError, ConfigTree, SiteRecord};
use crate::certs::CertificateRecord;
use crate::reconcile::SyncReport;
use crate::registry::ServiceDescriptor;

#[derive(Serialize)]
pub struct SystemStatus {
    pub caddy: bool,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SiteList {
    pub sites: Vec<SiteRecord>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct CertificateList {
    pub certs: Vec<CertificateRecord>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ServiceList {
    pub services: Vec<ServiceDescriptor>,
    pub total: usize,
}

/// Registration body. Fields default to empty so that a missing field is
/// reported by descriptor validation rather than as a JSON error.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub upstream: String,
}

#[derive(Serialize)]
pub struct Registered {
    pub registered: bool,
    #[serde(flatten)]
    pub service: ServiceDescriptor,
}

#[derive(Serialize)]
pub struct Deregistered {
    pub deleted: bool,
    pub name: String,
}

pub async fn get_status<A: AdminApi>(State(state): State<AppState<A>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        caddy: state.admin().is_reachable().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_sites<A: AdminApi>(
    State(state): State<AppState<A>>,
) -> Result<Json<SiteList>, ApiError> {
    let tree = live_config(&state).await?;
    let sites = extract_sites(&tree);
    Ok(Json(SiteList {
        total: sites.len(),
        sites,
    }))
}

pub async fn get_site<A: AdminApi>(
    State(state): State<AppState<A>>,
    Path(domain): Path<String>,
) -> Result<Json<SiteRecord>, ApiError> {
    let tree = live_config(&state).await?;
    find_site(&tree, &domain)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("site not found: {domain}")))
}

pub async fn list_certs<A: AdminApi>(State(state): State<AppState<A>>) -> Json<CertificateList> {
    let certs = state.certificates.collect().await;
    Json(CertificateList {
        total: certs.len(),
        certs,
    })
}

pub async fn list_services<A: AdminApi>(
    State(state): State<AppState<A>>,
) -> Result<Json<ServiceList>, ApiError> {
    let services = state.store().load().await?;
    Ok(Json(ServiceList {
        total: services.len(),
        services,
    }))
}

pub async fn register_service<A: AdminApi>(
    State(state): State<AppState<A>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid json: {}", e.body_text())))?;
    let service = ServiceDescriptor::new(request.name, request.domain, request.upstream);

    state.reconciler.register(service.clone()).await?;

    Ok((
        StatusCode::CREATED,
        Json(Registered {
            registered: true,
            service,
        }),
    ))
}

pub async fn deregister_service<A: AdminApi>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
) -> Result<Json<Deregistered>, ApiError> {
    deregister(&state, name).await
}

/// `DELETE /api/services/sync` shares its path with the resync route.
pub async fn deregister_service_named_sync<A: AdminApi>(
    State(state): State<AppState<A>>,
) -> Result<Json<Deregistered>, ApiError> {
    deregister(&state, "sync".to_string()).await
}

async fn deregister<A: AdminApi>(
    state: &AppState<A>,
    name: String,
) -> Result<Json<Deregistered>, ApiError> {
    state.reconciler.deregister(&name).await?;
    Ok(Json(Deregistered {
        deleted: true,
        name,
    }))
}

pub async fn sync_services<A: AdminApi>(
    State(state): State<AppState<A>>,
) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(state.reconciler.resync_all().await?))
}

/// Fetch the live config. An undecodable document reads as an empty one.
async fn live_config<A: AdminApi>(state: &AppState<A>) -> Result<ConfigTree, ApiError> {
    match state.admin().fetch_config().await {
        Ok(tree) => Ok(tree),
        Err(AdminError::Malformed(reason)) => {
            tracing::warn!(reason = %reason, "Live config could not be decoded, reporting no sites");
            Ok(ConfigTree::default())
        }
        Err(e) => Err(e.into()),
    }
}
