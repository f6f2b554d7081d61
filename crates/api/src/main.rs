use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podium_api::config::ServerConfig;
use podium_api::router::build_app_router;
use podium_api::state::AppState;
use podium_core::catalog_config::CatalogConfig;
use podium_events::engine::default_adapters;
use podium_events::{AchievementEngine, EngineConfig, EngineStores, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "podium_api=debug,podium_events=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        workers = engine_config.workers,
        queue_capacity = engine_config.queue_capacity,
        channels = ?engine_config.channels,
        "Loaded engine configuration"
    );

    // --- Storage ---
    let (stores, pool) = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = podium_db::create_pool(&database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection pool created");

            podium_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            podium_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            let store = Arc::new(podium_db::PgStore::new(pool.clone()));
            (EngineStores::from_shared(store), Some(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using the in-process store; progress is not persisted");
            (EngineStores::from_shared(Arc::new(MemoryStore::new())), None)
        }
    };

    // --- Engine ---
    let adapters = default_adapters(&engine_config).context("Invalid delivery channel configuration")?;
    let engine = AchievementEngine::new(stores, engine_config, adapters)
        .await
        .context("Failed to start achievement engine")?
        .with_reset_token(config.admin_reset_token.clone());
    let engine = Arc::new(engine);

    if let Some(path) = &config.achievements_config_path {
        tracing::info!(path = %path.display(), "Loading achievement catalog");
        let catalog = CatalogConfig::from_path(path)?;
        engine.load_config(&catalog).await?;
    }

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let mut handles = engine.spawn_workers(cancel.clone());
    if config.run_sweeps {
        handles.extend(engine.spawn_sweeps(cancel.clone()));
    } else {
        tracing::info!("Notification sweeps disabled, delivery is left to podium-worker");
    }
    tracing::info!(tasks = handles.len(), "Engine background tasks started");

    // --- App state ---
    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::new(config.clone()),
        pool,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host = config.host.parse::<IpAddr>().context("Invalid HOST address")?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping engine");
    cancel.cancel();

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    let drained = tokio::time::timeout(grace, futures::future::join_all(handles)).await;
    match drained {
        Ok(_) => tracing::info!("Graceful shutdown complete"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Background tasks did not stop in time"
        ),
    }

    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
