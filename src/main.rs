//! Caddy admin sidecar.
//!
//! # Architecture Overview
//!
//! ```text
//!     API client                          ┌──────────────────────────────────────┐
//!     ──────────▶ http (ids, trace, CORS) │ admin handlers                        │
//!                                         │   sites ──▶ caddy::client ──▶ sites   │──▶ Caddy admin API
//!                                         │   certs ──▶ certs scanner             │──▶ cert storage (fs)
//!                                         │   services ──▶ reconcile ──▶ registry │──▶ services.json
//!                                         └──────────────────────────────────────┘
//!     lifecycle: startup replay (background), graceful shutdown on SIGINT/SIGTERM
//! ```

use std::path::PathBuf;

use clap::Parser;

use caddy_admin::caddy::CaddyClient;
use caddy_admin::config::{resolve_config, ConfigOverrides};
use caddy_admin::lifecycle::{spawn_startup_replay, wait_for_signal, Shutdown};
use caddy_admin::net::{self, listener::bind_address};
use caddy_admin::observability::{logging, metrics};
use caddy_admin::{build_reconciler, build_server};

#[derive(Parser)]
#[command(name = "caddy-admin")]
#[command(about = "Admin API sidecar for Caddy", version)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "CADDY_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Caddy admin endpoint (host:port or URL).
    #[arg(long, env = "CADDY_ADMIN_ADDR")]
    admin_address: Option<String>,

    /// Address the API listens on.
    #[arg(long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Caddy data directory holding managed certificates.
    #[arg(long, env = "CADDY_CERT_STORE")]
    cert_store: Option<String>,

    /// Flat directory of externally issued certificates.
    #[arg(long, env = "EXTERNAL_CERT_DIR")]
    external_cert_dir: Option<String>,

    /// Registry file of dynamically registered services.
    #[arg(long, env = "SERVICES_FILE")]
    services_file: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            admin_address: self.admin_address.clone(),
            bind_address: self.listen.clone(),
            storage_root: self.cert_store.clone(),
            external_cert_dir: self.external_cert_dir.clone(),
            services_file: self.services_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.overrides())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "caddy-admin starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        caddy = %config.caddy.base_url(),
        server = %config.caddy.server_name,
        services_file = %config.registry.services_file,
        cert_store = %config.certificates.storage_root,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = CaddyClient::new(&config.caddy)?;
    let reconciler = build_reconciler(&config, client);

    let replay = if config.replay.enabled {
        Some(spawn_startup_replay(reconciler.clone()))
    } else {
        tracing::info!("Startup replay disabled");
        None
    };

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = build_server(&config, reconciler);
    match &config.listener.tls {
        Some(tls) => {
            let rustls = net::load_tls_config(tls).await?;
            let addr = bind_address(&config.listener)?;
            server.run_tls(addr, rustls, shutdown.wait()).await?;
        }
        None => {
            let listener = net::bind(&config.listener).await?;
            server.run(listener, shutdown.wait()).await?;
        }
    }

    if let Some(replay) = replay {
        replay.abort();
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
