//! Admin API error definitions.

use thiserror::Error;

/// Errors that can occur talking to the Caddy admin API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The endpoint could not be contacted (connect failure or timeout).
    #[error("caddy admin api unreachable: {0}")]
    Unreachable(String),

    /// Caddy answered with an application-level error status.
    #[error("caddy returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response could not be decoded as a Caddy config document.
    #[error("parse config: {0}")]
    Malformed(String),
}

impl AdminError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, AdminError::Unreachable(_))
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdminError::Malformed(e.to_string())
        } else {
            AdminError::Unreachable(e.to_string())
        }
    }
}

/// Result type for admin API operations.
pub type AdminResult<T> = Result<T, AdminError>;
