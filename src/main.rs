//! Tickworld Server - tick-driven persistent multiplayer text world
//!
//! This is the main entry point. It wires together:
//! - the engine task that owns the world and advances it tick by tick
//! - the raw TCP line server and the WebSocket bridge feeding it lines
//! - the persistence worker for accounts, characters and the world
//! - HTTP endpoints for health and live statistics

mod app;
mod auth;
mod config;
mod engine;
mod game;
mod http;
mod net;
mod session;
mod store;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::engine::{shared_stats, Engine};
use crate::game::World;
use crate::http::build_router;
use crate::net::tcp::run_line_server;
use crate::store::{FileStore, PersistenceWorker, Store, WorldFile};
use crate::util::shutdown::shutdown_channel;
use crate::util::time::{init_server_time, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Tickworld Server");
    info!("Line server address: {}", config.server_addr);

    let store = Store::from_config(&config);
    let world_file = load_world(&store, &config).await?;
    let world = World::from_file(world_file)?;
    info!(
        backend = store.backend_name(),
        rooms = world.room_count(),
        monsters = world.monster_count(),
        "World loaded"
    );

    // Engine <-> persistence worker
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let worker = PersistenceWorker::new(store, persist_rx, notice_tx).spawn();

    // Transports -> engine
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let stats = shared_stats();

    let engine = Engine::new(world, config.rules(), persist_tx, stats.clone(), rand::random())?;
    let engine_task = tokio::spawn(engine.run(
        events_rx,
        notice_rx,
        Arc::new(SystemClock),
        shutdown_rx.clone(),
    ));

    let state = AppState::new(config.clone(), events_tx, stats);

    // Line server
    let line_listener = TcpListener::bind(config.server_addr).await?;
    let line_task = tokio::spawn(run_line_server(line_listener, state.clone(), shutdown_rx.clone()));

    // HTTP surface
    let http_listener = TcpListener::bind(config.http_addr).await?;
    info!("Health check: http://{}/health", config.http_addr);
    info!("WebSocket endpoint: ws://{}/ws", config.http_addr);

    let router = build_router(state);
    let mut http_shutdown = shutdown_rx;
    let http_task = tokio::spawn(async move {
        axum::serve(
            http_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { http_shutdown.wait().await })
        .await
    });

    shutdown_signal().await;
    shutdown_tx.trigger();

    // The engine saves everyone on the way out; dropping it closes the
    // request channel so the worker drains and stops.
    engine_task.await?;
    worker.await?;
    line_task.await?;
    http_task.await??;

    info!("Server shutdown complete");
    Ok(())
}

/// Fetch the world document, falling back to the local world file when a
/// remote backend has none
async fn load_world(store: &Store, config: &Config) -> anyhow::Result<WorldFile> {
    match store.load_world().await {
        Ok(world) => Ok(world),
        Err(err) if !matches!(store, Store::File(_)) => {
            warn!(error = %err, path = %config.world_file.display(), "Backend world unavailable, using local file");
            let local = FileStore::new(&config.data_dir, &config.world_file);
            Ok(local.load_world().await?)
        }
        Err(err) => Err(anyhow::anyhow!(
            "failed to load world from {}: {}",
            config.world_file.display(),
            err
        )),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
