//! Standalone notification delivery process.
//!
//! Runs the delivery, retry and cleanup sweeps against PostgreSQL without
//! serving HTTP or evaluating events. The catalog snapshot is reloaded
//! periodically so notification text follows catalog edits made through the
//! API process.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podium_db::PgStore;
use podium_events::engine::default_adapters;
use podium_events::{AchievementEngine, EngineConfig, EngineStores};

const DEFAULT_CATALOG_REFRESH_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podium_worker=debug,podium_events=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine_config = EngineConfig::from_env();
    let refresh = Duration::from_secs(catalog_refresh_secs());

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = podium_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    podium_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    podium_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let store = Arc::new(PgStore::new(pool));
    let adapters = default_adapters(&engine_config).context("Invalid delivery channel configuration")?;
    let engine = AchievementEngine::new(EngineStores::from_shared(store.clone()), engine_config, adapters)
        .await
        .context("Failed to start achievement engine")?;

    let cancel = CancellationToken::new();
    let mut handles = engine.spawn_sweeps(cancel.clone());
    handles.push(tokio::spawn(run_catalog_refresh(
        Arc::new(engine),
        store,
        refresh,
        cancel.clone(),
    )));
    tracing::info!(tasks = handles.len(), "Worker started");

    shutdown_signal().await;
    cancel.cancel();
    futures::future::join_all(handles).await;
    tracing::info!("Worker stopped");

    Ok(())
}

/// Reload the catalog snapshot on an interval until cancelled.
async fn run_catalog_refresh(
    engine: Arc<AchievementEngine>,
    store: Arc<PgStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = period.as_secs(), "Catalog refresh started");
    let mut interval = tokio::time::interval(period);
    // The engine loaded the catalog at startup.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Catalog refresh stopping");
                break;
            }
            _ = interval.tick() => {
                match engine.registry().rebuild(store.as_ref()).await {
                    Ok(snapshot) => tracing::debug!(
                        achievements = snapshot.sorted().len(),
                        "Catalog snapshot refreshed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Catalog refresh failed"),
                }
            }
        }
    }
}

fn catalog_refresh_secs() -> u64 {
    match std::env::var("CATALOG_REFRESH_SECS") {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!(value = %raw, "Invalid CATALOG_REFRESH_SECS, using default");
                DEFAULT_CATALOG_REFRESH_SECS
            }
        },
        Err(_) => DEFAULT_CATALOG_REFRESH_SECS,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
