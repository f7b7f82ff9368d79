//! Convergence of live Caddy routes towards the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::caddy::{route_id, synthesize, AdminApi, AdminError, AdminResult};
use crate::config::ReplayConfig;
use crate::observability::metrics;
use crate::registry::descriptor::is_valid_name;
use crate::registry::{DescriptorError, RegistryError, RegistryResult, RegistryStore, ServiceDescriptor};

/// How long startup replay waits for Caddy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    /// Pause between reachability probes.
    pub interval: Duration,
    /// Probes before giving up.
    pub max_attempts: u32,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 15,
        }
    }
}

impl From<&ReplayConfig> for ReplayPolicy {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_attempts: config.max_attempts,
        }
    }
}

/// One service that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub name: String,
    pub error: String,
}

/// Result of applying a batch of services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub total: usize,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// How a startup replay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Caddy never became reachable; nothing was applied.
    Abandoned { attempts: u32 },
    /// The registry could not be read; nothing was applied.
    RegistryUnavailable(String),
    /// Every stored service was attempted.
    Replayed(SyncReport),
}

/// Errors from registration-level operations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Invalid(#[from] DescriptorError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("service '{name}': {source}")]
    Proxy {
        name: String,
        #[source]
        source: AdminError,
    },
}

/// Applies desired services from the registry to the live proxy.
///
/// Work on one service name is serialized: register, deregister and each
/// step of a batch hold that name's lock, and batches re-read the stored
/// descriptor under it, so the last writer's descriptor is what goes live.
pub struct Reconciler<A> {
    admin: Arc<A>,
    store: Arc<RegistryStore>,
    policy: ReplayPolicy,
    service_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<A: AdminApi> Reconciler<A> {
    pub fn new(admin: Arc<A>, store: Arc<RegistryStore>, policy: ReplayPolicy) -> Self {
        Self {
            admin,
            store,
            policy,
            service_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn admin(&self) -> &Arc<A> {
        &self.admin
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// Make the live route for `service` match its descriptor.
    ///
    /// Removes any route carrying the service id, then inserts a fresh one.
    /// A failed insert after a successful remove is not rolled back; the next
    /// resync restores it.
    pub async fn apply_one(&self, service: &ServiceDescriptor) -> AdminResult<()> {
        let fragment = synthesize(service);
        self.admin.delete_by_id(fragment.id()).await?;
        self.admin.insert_route(&fragment).await?;
        tracing::debug!(service = %service.name, id = %fragment.id(), "Service applied");
        Ok(())
    }

    /// Remove the live route for the service called `name`, if any.
    pub async fn remove_one(&self, name: &str) -> AdminResult<()> {
        self.admin.delete_by_id(&route_id(name)).await
    }

    /// Validate, persist, then apply a service.
    ///
    /// A proxy failure leaves the descriptor persisted so a later resync
    /// converges it.
    pub async fn register(&self, service: ServiceDescriptor) -> Result<(), ReconcileError> {
        service.validate()?;
        let _guard = self.lock_service(&service.name).await;
        self.store.upsert(service.clone()).await?;

        self.apply_one(&service)
            .await
            .map_err(|source| ReconcileError::Proxy {
                name: service.name.clone(),
                source,
            })?;

        tracing::info!(
            service = %service.name,
            domain = %service.domain,
            upstream = %service.upstream,
            "Service registered"
        );
        Ok(())
    }

    /// Remove a service's route, then forget it. Returns whether it was stored.
    pub async fn deregister(&self, name: &str) -> Result<bool, ReconcileError> {
        if !is_valid_name(name) {
            return Err(DescriptorError::InvalidName(name.to_string()).into());
        }

        let _guard = self.lock_service(name).await;
        self.remove_one(name)
            .await
            .map_err(|source| ReconcileError::Proxy {
                name: name.to_string(),
                source,
            })?;
        let existed = self.store.delete(name).await?;

        tracing::info!(service = %name, existed, "Service deregistered");
        Ok(existed)
    }

    /// Apply every stored service, continuing past failures.
    pub async fn resync_all(&self) -> RegistryResult<SyncReport> {
        let services = self.store.load().await?;
        let report = self.apply_all(&services).await;
        metrics::record_sync("resync", report.synced, report.failed());

        if report.failed() > 0 {
            tracing::warn!(
                synced = report.synced,
                total = report.total,
                errors = ?report.errors,
                "Sync partial failure"
            );
        } else {
            tracing::info!(synced = report.synced, total = report.total, "Sync complete");
        }
        Ok(report)
    }

    /// Wait for Caddy, then replay the whole registry into it.
    pub async fn startup_replay(&self) -> ReplayOutcome {
        if let Err(attempts) = self.wait_until_reachable().await {
            tracing::warn!(attempts, "Caddy not ready, skipping startup replay");
            return ReplayOutcome::Abandoned { attempts };
        }

        let services = match self.store.load().await {
            Ok(services) => services,
            Err(e) => {
                tracing::error!(error = %e, "Startup replay could not load registry");
                return ReplayOutcome::RegistryUnavailable(e.to_string());
            }
        };
        if services.is_empty() {
            tracing::info!("No persisted services to replay");
            return ReplayOutcome::Replayed(SyncReport::default());
        }

        let report = self.apply_all(&services).await;
        metrics::record_sync("startup", report.synced, report.failed());
        for failure in &report.errors {
            tracing::warn!(service = %failure.name, error = %failure.error, "Replay failed for service");
        }
        tracing::info!(
            synced = report.synced,
            total = report.total,
            "Restored services to caddy"
        );
        ReplayOutcome::Replayed(report)
    }

    /// Probe until reachable. `Ok(attempt)` on success, `Err(attempts)` when exhausted.
    async fn wait_until_reachable(&self) -> Result<u32, u32> {
        let max = self.policy.max_attempts.max(1);
        for attempt in 1..=max {
            if self.admin.is_reachable().await {
                return Ok(attempt);
            }
            tracing::info!(attempt, max, "Waiting for caddy");
            if attempt < max {
                tokio::time::sleep(self.policy.interval).await;
            }
        }
        Err(max)
    }

    /// Apply each listed service in turn.
    ///
    /// `services` only names the work. The descriptor applied is re-read
    /// under the service lock; one removed since the listing counts as
    /// synced with nothing to apply.
    async fn apply_all(&self, services: &[ServiceDescriptor]) -> SyncReport {
        let mut report = SyncReport {
            total: services.len(),
            ..SyncReport::default()
        };
        for listed in services {
            let _guard = self.lock_service(&listed.name).await;
            let result = match self.store.get(&listed.name).await {
                Ok(Some(current)) => self.apply_one(&current).await.map_err(|e| e.to_string()),
                Ok(None) => {
                    tracing::debug!(service = %listed.name, "Service removed before apply, skipping");
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            };
            match result {
                Ok(()) => report.synced += 1,
                Err(error) => report.errors.push(SyncFailure {
                    name: listed.name.clone(),
                    error,
                }),
            }
        }
        report
    }

    async fn lock_service(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .service_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

impl<A> std::fmt::Debug for Reconciler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.store.path())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caddy::{extract_sites, ConfigTree, RouteFragment, SiteKind};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory stand-in for the Caddy admin API.
    #[derive(Default)]
    struct FakeAdmin {
        routes: Mutex<Vec<Value>>,
        unreachable: AtomicBool,
        rejected_domains: Mutex<HashSet<String>>,
        inserts: AtomicUsize,
        probes: AtomicUsize,
    }

    impl FakeAdmin {
        fn reject(&self, domain: &str) {
            self.rejected_domains.lock().unwrap().insert(domain.to_string());
        }

        fn routes_with_id(&self, id: &str) -> usize {
            self.routes
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r["@id"] == id)
                .count()
        }

        fn check_reachable(&self) -> AdminResult<()> {
            if self.unreachable.load(Ordering::SeqCst) {
                Err(AdminError::Unreachable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl AdminApi for FakeAdmin {
        async fn fetch_config(&self) -> AdminResult<ConfigTree> {
            self.check_reachable()?;
            let routes = self.routes.lock().unwrap().clone();
            Ok(serde_json::from_value(json!({
                "apps": {"http": {"servers": {"srv0": {"routes": routes}}}}
            }))
            .unwrap())
        }

        async fn is_reachable(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            !self.unreachable.load(Ordering::SeqCst)
        }

        async fn insert_route(&self, fragment: &RouteFragment) -> AdminResult<()> {
            self.check_reachable()?;
            let domain = fragment.as_json()["match"][0]["host"][0]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if self.rejected_domains.lock().unwrap().contains(&domain) {
                return Err(AdminError::Rejected {
                    status: 400,
                    body: "loading new config: invalid host".into(),
                });
            }
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.routes.lock().unwrap().insert(0, fragment.as_json().clone());
            Ok(())
        }

        async fn delete_by_id(&self, id: &str) -> AdminResult<()> {
            self.check_reachable()?;
            self.routes.lock().unwrap().retain(|r| r["@id"] != id);
            Ok(())
        }
    }

    fn reconciler(dir: &tempfile::TempDir) -> Reconciler<FakeAdmin> {
        let store = Arc::new(RegistryStore::new(dir.path().join("services.json")));
        let policy = ReplayPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 3,
        };
        Reconciler::new(Arc::new(FakeAdmin::default()), store, policy)
    }

    fn svc(name: &str, domain: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(name, domain, format!("{name}:8080"))
    }

    #[tokio::test]
    async fn test_apply_one_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        let service = svc("api", "api.example.com");

        r.apply_one(&service).await.unwrap();
        let once = r.admin().routes.lock().unwrap().clone();
        r.apply_one(&service).await.unwrap();
        let twice = r.admin().routes.lock().unwrap().clone();

        assert_eq!(once, twice);
        assert_eq!(r.admin().routes_with_id("svc-api"), 1);
    }

    #[tokio::test]
    async fn test_apply_one_replaces_changed_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.apply_one(&ServiceDescriptor::new("api", "api.example.com", "old:1")).await.unwrap();
        r.apply_one(&ServiceDescriptor::new("api", "api.example.com", "new:2")).await.unwrap();

        let sites = extract_sites(&r.admin().fetch_config().await.unwrap());
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].kind, SiteKind::Proxy);
        assert_eq!(sites[0].upstream_address.as_deref(), Some("new:2"));
    }

    #[tokio::test]
    async fn test_register_persists_and_applies() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);

        r.register(svc("api", "api.example.com")).await.unwrap();

        assert_eq!(r.store().load().await.unwrap(), vec![svc("api", "api.example.com")]);
        assert_eq!(r.admin().routes_with_id("svc-api"), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);

        let err = r.register(ServiceDescriptor::new("bad name", "a.example", "a:1")).await;
        assert!(matches!(err, Err(ReconcileError::Invalid(_))));
        assert!(r.store().load().await.unwrap().is_empty());
        assert_eq!(r.admin().inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_keeps_descriptor_when_proxy_down() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.admin().unreachable.store(true, Ordering::SeqCst);

        let err = r.register(svc("api", "api.example.com")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Proxy { ref source, .. } if source.is_unreachable()));
        assert_eq!(r.store().load().await.unwrap().len(), 1);

        // Once the proxy is back a resync converges.
        r.admin().unreachable.store(false, Ordering::SeqCst);
        let report = r.resync_all().await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(r.admin().routes_with_id("svc-api"), 1);
    }

    #[tokio::test]
    async fn test_deregister() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.register(svc("api", "api.example.com")).await.unwrap();

        assert!(r.deregister("api").await.unwrap());
        assert_eq!(r.admin().routes_with_id("svc-api"), 0);
        assert!(r.store().load().await.unwrap().is_empty());

        assert!(!r.deregister("api").await.unwrap());
    }

    #[tokio::test]
    async fn test_deregister_keeps_descriptor_when_proxy_down() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.register(svc("api", "api.example.com")).await.unwrap();
        r.admin().unreachable.store(true, Ordering::SeqCst);

        assert!(r.deregister("api").await.is_err());
        assert_eq!(r.store().load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resync_reports_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        for s in [svc("a", "a.example"), svc("b", "b.example"), svc("c", "c.example")] {
            r.store().upsert(s).await.unwrap();
        }
        r.admin().reject("b.example");

        let report = r.resync_all().await.unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.synced, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].name, "b");
        assert!(report.errors[0].error.contains("400"));
        // The service after the failing one was still processed.
        assert_eq!(r.admin().routes_with_id("svc-c"), 1);
    }

    #[tokio::test]
    async fn test_startup_replay_applies_registry() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.store().upsert(svc("a", "a.example")).await.unwrap();
        r.store().upsert(svc("b", "b.example")).await.unwrap();

        let outcome = r.startup_replay().await;

        let ReplayOutcome::Replayed(report) = outcome else {
            panic!("expected replay, got {outcome:?}");
        };
        assert_eq!((report.synced, report.total), (2, 2));
        assert_eq!(r.admin().probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_startup_replay_abandons_when_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.store().upsert(svc("a", "a.example")).await.unwrap();
        let before = std::fs::read(r.store().path()).unwrap();
        r.admin().unreachable.store(true, Ordering::SeqCst);

        let outcome = r.startup_replay().await;

        assert_eq!(outcome, ReplayOutcome::Abandoned { attempts: 3 });
        assert_eq!(r.admin().probes.load(Ordering::SeqCst), 3);
        assert_eq!(r.admin().inserts.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(r.store().path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_startup_replay_with_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        assert_eq!(
            r.startup_replay().await,
            ReplayOutcome::Replayed(SyncReport::default())
        );
    }

    #[tokio::test]
    async fn test_batch_applies_stored_descriptor_not_listing() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        let stale = ServiceDescriptor::new("api", "api.example.com", "old:1");
        r.register(ServiceDescriptor::new("api", "api.example.com", "new:2")).await.unwrap();

        // A replay listed the registry before the newer registration landed.
        let report = r.apply_all(&[stale]).await;

        assert_eq!(report.synced, 1);
        let sites = extract_sites(&r.admin().fetch_config().await.unwrap());
        assert_eq!(sites[0].upstream_address.as_deref(), Some("new:2"));
    }

    #[tokio::test]
    async fn test_batch_skips_service_removed_since_listing() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        r.register(svc("api", "api.example.com")).await.unwrap();
        let listing = r.store().load().await.unwrap();
        r.deregister("api").await.unwrap();

        let report = r.apply_all(&listing).await;

        assert_eq!((report.synced, report.failed()), (1, 0));
        assert_eq!(r.admin().routes_with_id("svc-api"), 0);
    }

    #[tokio::test]
    async fn test_register_waits_for_service_lock() {
        let dir = tempfile::tempdir().unwrap();
        let r = reconciler(&dir);
        let guard = r.lock_service("api").await;

        let register = r.register(svc("api", "api.example.com"));
        tokio::pin!(register);
        let pending = tokio::time::timeout(Duration::from_millis(50), &mut register).await;
        assert!(pending.is_err());
        assert!(r.store().load().await.unwrap().is_empty());

        drop(guard);
        register.await.unwrap();
        assert_eq!(r.admin().routes_with_id("svc-api"), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ReplayPolicy::from(&ReplayConfig::default());
        assert_eq!(policy, ReplayPolicy::default());
        assert_eq!(policy.interval * policy.max_attempts, Duration::from_secs(30));
    }
}
