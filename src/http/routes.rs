//! HTTP route definitions

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::engine::ServerStats;
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick: stats.tick,
        players: stats.players,
    })
}

// ============================================================================
// Stats endpoint
// ============================================================================

async fn stats_handler(State(state): State<AppState>) -> Json<ServerStats> {
    Json(state.stats.read().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::shared_stats;
    use tokio::sync::mpsc;

    fn state() -> AppState {
        let (events, _rx) = mpsc::unbounded_channel();
        let stats = shared_stats();
        stats.write().tick = 42;
        stats.write().players = 3;
        AppState::new(Config::sample(), events, stats)
    }

    #[tokio::test]
    async fn health_reports_engine_progress() {
        let Json(health) = health_handler(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.tick, 42);
        assert_eq!(health.players, 3);
    }

    #[tokio::test]
    async fn stats_mirror_the_published_snapshot() {
        let Json(stats) = stats_handler(State(state())).await;
        assert_eq!(stats.tick, 42);
        assert_eq!(stats.players, 3);
    }
}
