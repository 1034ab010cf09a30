//! Application state shared across connections and routes

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::engine::SharedStats;
use crate::net::{ConnectionLimits, NetEvent};

/// Handles every transport task needs; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Inbound side of the engine
    pub events: mpsc::UnboundedSender<NetEvent>,
    pub limits: ConnectionLimits,
    pub stats: SharedStats,
}

impl AppState {
    pub fn new(config: Config, events: mpsc::UnboundedSender<NetEvent>, stats: SharedStats) -> Self {
        let limits = ConnectionLimits::new(config.max_connections_per_ip);
        Self {
            config: Arc::new(config),
            events,
            limits,
            stats,
        }
    }
}
