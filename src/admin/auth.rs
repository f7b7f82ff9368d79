use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::admin::error::ApiError;

/// Bearer token required on every API route when configured.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    fn accepts(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token.as_bytes() == self.0.as_bytes())
    }
}

pub async fn admin_auth_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = key.accepts(
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok()),
    );

    if authorized {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
    Err(ApiError::Unauthorized)
}
