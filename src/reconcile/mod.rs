//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! registry (desired services)
//!     → reconciler.rs
//!         → route synthesis (caddy::route)
//!         → delete_by_id + insert_route (caddy::client)
//!     → live proxy config
//!
//! Triggers:
//!     → register/deregister (API request, one service)
//!     → resync (API request, whole registry)
//!     → startup replay (background task, whole registry)
//! ```
//!
//! # Design Decisions
//! - One-directional: live routes not in the registry are left alone
//! - Remove-then-add per service; no rollback of a half-applied service
//! - Work on one service name is serialized, and batches apply the stored
//!   descriptor rather than the one they listed
//! - Batch operations continue past per-service failures and report them
//! - Startup replay waits for the proxy with a bounded number of probes

pub mod reconciler;

pub use reconciler::{
    ReconcileError, Reconciler, ReplayOutcome, ReplayPolicy, SyncFailure, SyncReport,
};
