//! Shared utilities for integration tests.
//!
//! Provides an in-process stand-in for the Caddy admin API that keeps a
//! mutable JSON config and understands the handful of endpoints the sidecar
//! uses.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use caddy_admin::config::SidecarConfig;

#[derive(Default)]
struct FakeState {
    config: Mutex<Value>,
    rejected_hosts: Mutex<HashSet<String>>,
    reject_all: Mutex<bool>,
}

/// Handle to a running fake Caddy admin API.
#[derive(Clone)]
pub struct FakeCaddy {
    pub addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeCaddy {
    /// Start serving `initial` as the live config on an ephemeral port.
    pub async fn start(initial: Value) -> Self {
        let state = Arc::new(FakeState::default());
        *state.config.lock().unwrap() = initial;

        let app = Router::new()
            .route("/config/", get(get_config))
            .route(
                "/config/apps/http/servers/{server}/routes/{index}",
                put(insert_route),
            )
            .route("/id/{id}", delete(delete_by_id))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn config(&self) -> Value {
        self.state.config.lock().unwrap().clone()
    }

    /// Replace the live config, as a Caddy restart would.
    pub fn set_config(&self, config: Value) {
        *self.state.config.lock().unwrap() = config;
    }

    pub fn routes(&self, server: &str) -> Vec<Value> {
        self.config()["apps"]["http"]["servers"][server]["routes"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub fn count_id(&self, server: &str, id: &str) -> usize {
        self.routes(server).iter().filter(|r| r["@id"] == id).count()
    }

    /// Fail inserts of routes matching `host` with 400.
    pub fn reject_host(&self, host: &str) {
        self.state.rejected_hosts.lock().unwrap().insert(host.to_string());
    }

    /// Fail every insert with 500.
    pub fn reject_all(&self, reject: bool) {
        *self.state.reject_all.lock().unwrap() = reject;
    }
}

async fn get_config(State(state): State<Arc<FakeState>>) -> Json<Value> {
    Json(state.config.lock().unwrap().clone())
}

async fn insert_route(
    State(state): State<Arc<FakeState>>,
    Path((server, index)): Path<(String, usize)>,
    body: Bytes,
) -> Response {
    if *state.reject_all.lock().unwrap() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "loading config: storage failure");
    }
    let Ok(route) = serde_json::from_slice::<Value>(&body) else {
        return error(StatusCode::BAD_REQUEST, "decoding request body");
    };
    let host = route["match"][0]["host"][0].as_str().unwrap_or_default().to_string();
    if state.rejected_hosts.lock().unwrap().contains(&host) {
        return error(StatusCode::BAD_REQUEST, &format!("invalid host: {host}"));
    }

    let mut config = state.config.lock().unwrap();
    let Some(routes) = config
        .pointer_mut(&format!("/apps/http/servers/{server}/routes"))
        .and_then(Value::as_array_mut)
    else {
        return error(StatusCode::NOT_FOUND, "invalid traversal path");
    };
    let index = index.min(routes.len());
    routes.insert(index, route);
    StatusCode::OK.into_response()
}

async fn delete_by_id(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
    let mut config = state.config.lock().unwrap();
    let mut removed = false;
    if let Some(servers) = config
        .pointer_mut("/apps/http/servers")
        .and_then(Value::as_object_mut)
    {
        for server in servers.values_mut() {
            if let Some(routes) = server.get_mut("routes").and_then(Value::as_array_mut) {
                let before = routes.len();
                routes.retain(|r| r["@id"] != id.as_str());
                removed |= routes.len() != before;
            }
        }
    }

    if removed {
        StatusCode::OK.into_response()
    } else {
        error(StatusCode::NOT_FOUND, &format!("unknown object ID '{id}'"))
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// A live config with one static site, one proxied pair of hosts and a TLS policy.
pub fn sample_config() -> Value {
    json!({
        "apps": {
            "http": {
                "servers": {
                    "srv0": {
                        "listen": [":443"],
                        "routes": [
                            {
                                "match": [{"host": ["static.example.com"]}],
                                "handle": [{
                                    "handler": "subroute",
                                    "routes": [{
                                        "handle": [
                                            {"handler": "headers", "response": {"set": {"Cache-Control": ["max-age=60"]}}},
                                            {"handler": "file_server", "root": "/srv/www"}
                                        ]
                                    }]
                                }],
                                "terminal": true
                            },
                            {
                                "match": [{"host": ["app.example.com", "www.app.example.com"]}],
                                "handle": [{
                                    "handler": "reverse_proxy",
                                    "upstreams": [{"dial": "10.0.0.5:8080"}]
                                }]
                            }
                        ]
                    }
                }
            },
            "tls": {
                "automation": {
                    "policies": [{"subjects": ["app.example.com", "static.example.com"]}]
                }
            }
        }
    })
}

/// A config with an empty `srv0`, as after a fresh Caddy start.
pub fn empty_server_config() -> Value {
    json!({"apps": {"http": {"servers": {"srv0": {"listen": [":443"], "routes": []}}}}})
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Sidecar config pointed at `caddy` with the registry inside `dir`.
pub fn sidecar_config(caddy: SocketAddr, dir: &tempfile::TempDir) -> SidecarConfig {
    let mut config = SidecarConfig::default();
    config.caddy.admin_address = caddy.to_string();
    config.caddy.timeout_secs = 2;
    config.registry.services_file = dir.path().join("services.json").display().to_string();
    config.certificates.storage_root = dir.path().join("caddy").display().to_string();
    config.replay.interval_secs = 1;
    config.replay.max_attempts = 2;
    config
}

/// Build a request with an optional JSON body.
pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Split a response into status and JSON body.
pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
