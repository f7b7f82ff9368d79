//! Caddy admin API client with timeout and error handling.
//!
//! # Responsibilities
//! - Fetch the live config (`GET /config/`)
//! - Insert a route at a fixed position of the target server
//! - Delete objects by `@id` (`DELETE /id/<id>`)
//! - Probe reachability

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};

use crate::caddy::error::{AdminError, AdminResult};
use crate::caddy::model::ConfigTree;
use crate::caddy::route::RouteFragment;
use crate::config::CaddyConfig;
use crate::observability::metrics;

/// Operations the sidecar needs from the proxy's control plane.
pub trait AdminApi: Send + Sync + 'static {
    /// Fetch and decode the live config.
    fn fetch_config(&self) -> impl Future<Output = AdminResult<ConfigTree>> + Send;

    /// True if the admin endpoint answers `GET /config/` with 200.
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;

    /// Insert a route at the head of the target server's route list.
    fn insert_route(&self, fragment: &RouteFragment) -> impl Future<Output = AdminResult<()>> + Send;

    /// Delete the object with the given `@id`. A missing object is not an error.
    fn delete_by_id(&self, id: &str) -> impl Future<Output = AdminResult<()>> + Send;
}

/// HTTP client for the Caddy admin endpoint.
#[derive(Clone)]
pub struct CaddyClient {
    http: Client,
    base_url: String,
    server_name: String,
    timeout: Duration,
}

impl CaddyClient {
    /// Create a client from configuration.
    pub fn new(config: &CaddyConfig) -> AdminResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .no_proxy()
            .build()
            .map_err(|e| AdminError::Unreachable(format!("build client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            server_name: config.server_name.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn routes_url(&self) -> String {
        format!(
            "{}/config/apps/http/servers/{}/routes/0",
            self.base_url, self.server_name
        )
    }

    /// Send a request; 404 passes through, other 4xx/5xx become `Rejected`.
    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: String,
        body: Option<Vec<u8>>,
    ) -> AdminResult<reqwest::Response> {
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                metrics::record_admin_call(operation, "unreachable");
                tracing::warn!(url = %url, error = %e, timeout = ?self.timeout, "Caddy admin API unreachable");
                return Err(AdminError::Unreachable(e.to_string()));
            }
        };

        let status = response.status();
        if (status.is_client_error() || status.is_server_error()) && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            metrics::record_admin_call(operation, "rejected");
            return Err(AdminError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        metrics::record_admin_call(operation, "ok");
        Ok(response)
    }
}

impl AdminApi for CaddyClient {
    async fn fetch_config(&self) -> AdminResult<ConfigTree> {
        let url = format!("{}/config/", self.base_url);
        let response = self.send("fetch_config", Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AdminError::Rejected {
                status: 404,
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        ConfigTree::from_slice(&bytes).map_err(|e| AdminError::Malformed(e.to_string()))
    }

    async fn is_reachable(&self) -> bool {
        match self.http.get(format!("{}/config/", self.base_url)).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, "Caddy reachability probe failed");
                false
            }
        }
    }

    async fn insert_route(&self, fragment: &RouteFragment) -> AdminResult<()> {
        let response = self
            .send("insert_route", Method::PUT, self.routes_url(), Some(fragment.to_bytes()))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            // The target server does not exist; nothing was inserted.
            return Err(AdminError::Rejected {
                status: 404,
                body: response.text().await.unwrap_or_default(),
            });
        }
        tracing::debug!(id = %fragment.id(), "Route inserted");
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> AdminResult<()> {
        let url = format!("{}/id/{}", self.base_url, id);
        let response = self.send("delete_by_id", Method::DELETE, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(id = %id, "Route not present, nothing to delete");
        }
        Ok(())
    }
}

impl std::fmt::Debug for CaddyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaddyClient")
            .field("base_url", &self.base_url)
            .field("server_name", &self.server_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}
