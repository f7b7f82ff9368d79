//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the API router in the middleware stack
//! - Serve over plain TCP or rustls
//! - Drain in-flight requests on shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::http::request::{request_id_of, MakeRequestUuid, X_REQUEST_ID};

/// Grace period for in-flight TLS connections after shutdown is requested.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the admin API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Wrap `api` in the middleware stack configured by `config`.
    pub fn new(config: &ListenerConfig, api: Router) -> Self {
        Self {
            router: Self::build_router(config, api),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ListenerConfig, api: Router) -> Router {
        let mut router =
            api.layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)));

        if config.cors_enabled {
            router = router.layer(cors_layer());
        }

        router
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id_of(request),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS on `addr` until `shutdown` resolves.
    pub async fn run_tls<F>(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            shutdown_handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
