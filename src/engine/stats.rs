//! Engine statistics published for the HTTP surface

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStats {
    pub tick: u64,
    pub uptime_secs: u64,
    pub sessions: usize,
    pub players: usize,
    pub rooms: usize,
    pub monsters: usize,
    pub combats: usize,
    pub lines_handled: u64,
    pub overruns: u64,
    pub last_tick_micros: u64,
}

/// Written by the engine once per tick, read by HTTP handlers
pub type SharedStats = Arc<RwLock<ServerStats>>;

pub fn shared_stats() -> SharedStats {
    Arc::new(RwLock::new(ServerStats::default()))
}
