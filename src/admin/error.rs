//! HTTP-facing error type for the admin API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::caddy::AdminError;
use crate::reconcile::ReconcileError;
use crate::registry::{DescriptorError, RegistryError};

/// Errors returned by API handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("cannot reach caddy: {0}")]
    ProxyUnavailable(String),

    #[error("{0}")]
    ProxyFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ProxyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ProxyFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Unreachable(msg) => ApiError::ProxyUnavailable(msg),
            other => ApiError::ProxyFailed(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Internal(format!("registry: {err}"))
    }
}

impl From<DescriptorError> for ApiError {
    fn from(err: DescriptorError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Invalid(e) => e.into(),
            ReconcileError::Registry(e) => e.into(),
            ReconcileError::Proxy { name, source } => match source {
                AdminError::Unreachable(msg) => {
                    ApiError::ProxyUnavailable(format!("service '{name}': {msg}"))
                }
                other => ApiError::ProxyFailed(format!("service '{name}': {other}")),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
