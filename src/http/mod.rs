//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → request.rs (assign x-request-id)
//!     → server.rs middleware (trace span, CORS, timeout)
//!     → admin API router
//!     → response (x-request-id echoed back)
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
