//! Background startup tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::caddy::AdminApi;
use crate::reconcile::{Reconciler, ReplayOutcome};

/// Replay the registry into Caddy on a background task.
///
/// The API is already serving while this runs; the task ends on its own once
/// the replay completes or the probe budget is spent.
pub fn spawn_startup_replay<A: AdminApi>(reconciler: Arc<Reconciler<A>>) -> JoinHandle<ReplayOutcome> {
    tokio::spawn(async move {
        tracing::info!("Startup replay started");
        reconciler.startup_replay().await
    })
}
