//! HTTP server command implementation.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use feelme::config::Config;
use feelme::reconcile::ReconcileJob;
use feelme::scheduler::CleanupScheduler;
use feelme::server;

pub async fn run(
    config_path: &str,
    host_override: Option<IpAddr>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = Config::load(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    // CLI overrides config
    if let Some(host) = host_override {
        config.server.host = host.to_string();
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let policy = config.reconcile.policy()?;
    let (bookings, archive) = super::open_stores(&config).await?;

    // Tables are also created on demand via the export endpoint
    if let Err(e) = archive.ensure_schema().await {
        warn!(error = %e, "Could not prepare archive tables, continuing");
    }

    let job = ReconcileJob::new(bookings.clone(), archive.clone(), policy);
    let scheduler = CleanupScheduler::new(job.clone(), config.reconcile.scheduler());
    if config.reconcile.auto_start {
        scheduler.start().await?;
    } else {
        info!("Cleanup scheduler not started (reconcile.auto_start = false)");
    }

    // Create shutdown channel for HTTP-triggered shutdown
    let (shutdown_tx, shutdown_rx) = server::shutdown_channel();

    let state = server::AppState {
        bookings,
        archive,
        job,
        scheduler: scheduler.clone(),
        policy,
        admin_token: config.server.admin_token.clone().filter(|t| !t.is_empty()),
        max_connections: config.server.max_concurrent_requests,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host '{}'", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(addr = %addr, timezone = %policy.timezone, "Starting server");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_rx))
    .await?;

    // Let an in-progress pass finish before exiting
    scheduler.shutdown().await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(http_shutdown: tokio::sync::oneshot::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
        _ = http_shutdown => info!("Received shutdown request via HTTP, shutting down..."),
    }
}
