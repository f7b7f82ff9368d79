//! Startup replay and restart recovery against a fake Caddy admin endpoint.

use std::time::Duration;

use caddy_admin::build_reconciler;
use caddy_admin::caddy::{extract_sites, AdminApi, CaddyClient, SiteKind};
use caddy_admin::lifecycle::spawn_startup_replay;
use caddy_admin::reconcile::ReplayOutcome;
use caddy_admin::registry::ServiceDescriptor;

mod common;

use common::FakeCaddy;

#[tokio::test]
async fn test_registrations_survive_caddy_restart() {
    let dir = tempfile::tempdir().unwrap();
    let caddy = FakeCaddy::start(common::empty_server_config()).await;
    let config = common::sidecar_config(caddy.addr, &dir);
    let reconciler = build_reconciler(&config, CaddyClient::new(&config.caddy).unwrap());

    reconciler
        .register(ServiceDescriptor::new("api", "api.example.com", "backend:3000"))
        .await
        .unwrap();
    reconciler
        .register(ServiceDescriptor::new("web", "web.example.com", "web:80"))
        .await
        .unwrap();

    // Caddy restarts from its static config and forgets dynamic routes.
    caddy.set_config(common::empty_server_config());
    assert!(caddy.routes("srv0").is_empty());

    let outcome = spawn_startup_replay(reconciler.clone()).await.unwrap();

    let ReplayOutcome::Replayed(report) = outcome else {
        panic!("expected replay, got {outcome:?}");
    };
    assert_eq!((report.synced, report.total), (2, 2));
    assert_eq!(caddy.count_id("srv0", "svc-api"), 1);
    assert_eq!(caddy.count_id("srv0", "svc-web"), 1);

    let sites = extract_sites(&reconciler.admin().fetch_config().await.unwrap());
    assert_eq!(sites.len(), 2);
    assert!(sites.iter().all(|s| s.kind == SiteKind::Proxy));
}

#[tokio::test]
async fn test_replay_abandons_when_caddy_never_comes_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::sidecar_config(common::unused_addr(), &dir);
    config.replay.max_attempts = 2;
    config.replay.interval_secs = 1;
    let reconciler = build_reconciler(&config, CaddyClient::new(&config.caddy).unwrap());
    reconciler
        .store()
        .upsert(ServiceDescriptor::new("api", "api.example.com", "backend:3000"))
        .await
        .unwrap();
    let before = std::fs::read(&config.registry.services_file).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), reconciler.startup_replay())
        .await
        .unwrap();

    assert_eq!(outcome, ReplayOutcome::Abandoned { attempts: 2 });
    assert_eq!(std::fs::read(&config.registry.services_file).unwrap(), before);
}

#[tokio::test]
async fn test_replay_is_idempotent_over_live_routes() {
    let dir = tempfile::tempdir().unwrap();
    let caddy = FakeCaddy::start(common::sample_config()).await;
    let config = common::sidecar_config(caddy.addr, &dir);
    let reconciler = build_reconciler(&config, CaddyClient::new(&config.caddy).unwrap());
    reconciler
        .register(ServiceDescriptor::new("api", "api.example.com", "backend:3000"))
        .await
        .unwrap();

    // Routes already live: replay replaces rather than duplicates.
    reconciler.startup_replay().await;
    reconciler.startup_replay().await;

    assert_eq!(caddy.count_id("srv0", "svc-api"), 1);
    // Routes the sidecar does not own are left alone.
    assert_eq!(caddy.routes("srv0").len(), 3);
}
