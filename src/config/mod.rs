//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::session::output::HeartbeatPolicy;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Line server binding address
    pub server_addr: SocketAddr,
    /// HTTP surface (health, stats, websocket bridge) binding address
    pub http_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Tick period in milliseconds
    pub tick_millis: u64,
    /// Idle seconds before an unauthenticated connection is dropped
    pub login_timeout_secs: u64,
    /// Send a status line every tick even when nothing changed
    pub status_heartbeat: bool,

    pub start_room: u32,
    pub respawn_room: u32,
    pub flee_chance: f64,
    pub wander_every_ticks: u64,
    pub regen_every_ticks: u64,
    pub autosave_every_ticks: u64,
    pub repop_every_ticks: u64,

    pub max_players: usize,
    pub max_connections_per_ip: usize,
    /// Input lines per second per connection
    pub input_rate_limit: u32,
    pub min_admin_level: u8,

    /// Root for file-backed accounts and characters
    pub data_dir: PathBuf,
    pub world_file: PathBuf,

    /// PostgREST base URL; file storage is used when unset
    pub store_url: Option<String>,
    /// Service key for the PostgREST backend
    pub store_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR when a host platform provides it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string())
        };
        let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let store_url = env::var("STORE_URL").ok().filter(|url| !url.is_empty());
        let store_key = env::var("STORE_KEY").ok().filter(|key| !key.is_empty());
        if store_url.is_some() && store_key.is_none() {
            return Err(ConfigError::Missing("STORE_KEY"));
        }

        let flee_chance: f64 = parse_var("FLEE_CHANCE", 0.5)?;
        if !(0.0..=1.0).contains(&flee_chance) {
            return Err(ConfigError::Invalid {
                name: "FLEE_CHANCE",
                value: flee_chance.to_string(),
            });
        }

        let tick_millis: u64 = parse_var("TICK_MILLIS", 500)?;
        if tick_millis == 0 {
            return Err(ConfigError::Invalid {
                name: "TICK_MILLIS",
                value: "0".to_string(),
            });
        }

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let world_file = env::var("WORLD_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("world.json"));

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress("SERVER_ADDR"))?,
            http_addr: http_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress("HTTP_ADDR"))?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tick_millis,
            login_timeout_secs: parse_var("LOGIN_TIMEOUT_SECS", 120)?,
            status_heartbeat: parse_var("STATUS_HEARTBEAT", false)?,

            start_room: parse_var("START_ROOM", 1)?,
            respawn_room: parse_var("RESPAWN_ROOM", 2)?,
            flee_chance,
            wander_every_ticks: parse_var("WANDER_EVERY_TICKS", 8)?,
            regen_every_ticks: parse_var("REGEN_EVERY_TICKS", 4)?,
            autosave_every_ticks: parse_var("AUTOSAVE_EVERY_TICKS", 120)?,
            repop_every_ticks: parse_var("REPOP_EVERY_TICKS", 60)?,

            max_players: parse_var("MAX_PLAYERS", 64)?,
            max_connections_per_ip: parse_var("MAX_CONNECTIONS_PER_IP", 8)?,
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", 10)?,
            min_admin_level: parse_var("MIN_ADMIN_LEVEL", 2)?,

            data_dir,
            world_file,

            store_url,
            store_key,
        })
    }

    /// Derive the gameplay rules the engine runs with
    pub fn rules(&self) -> GameRules {
        let tick_period = Duration::from_millis(self.tick_millis);
        let login_timeout_ticks =
            (self.login_timeout_secs.saturating_mul(1000) / self.tick_millis).max(1);

        GameRules {
            tick_period,
            start_room: self.start_room,
            respawn_room: self.respawn_room,
            flee_chance: self.flee_chance,
            wander_every: self.wander_every_ticks.max(1),
            regen_every: self.regen_every_ticks.max(1),
            autosave_every: self.autosave_every_ticks.max(1),
            repop_every: self.repop_every_ticks.max(1),
            login_timeout_ticks,
            max_players: self.max_players,
            min_admin_level: self.min_admin_level,
            heartbeat: if self.status_heartbeat {
                HeartbeatPolicy::EveryTick
            } else {
                HeartbeatPolicy::OnChange
            },
            ..GameRules::default()
        }
    }
}

#[cfg(test)]
impl Config {
    /// Fixed settings for unit tests
    pub(crate) fn sample() -> Config {
        Config {
            server_addr: "127.0.0.1:4000".parse().unwrap(),
            http_addr: "127.0.0.1:8080".parse().unwrap(),
            log_level: "info".to_string(),
            tick_millis: 250,
            login_timeout_secs: 30,
            status_heartbeat: true,
            start_room: 1,
            respawn_room: 2,
            flee_chance: 0.25,
            wander_every_ticks: 0,
            regen_every_ticks: 4,
            autosave_every_ticks: 120,
            repop_every_ticks: 60,
            max_players: 10,
            max_connections_per_ip: 2,
            input_rate_limit: 5,
            min_admin_level: 3,
            data_dir: PathBuf::from("data"),
            world_file: PathBuf::from("data/world.json"),
            store_url: None,
            store_key: None,
        }
    }
}

/// Read an optional environment variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid { name, value })
        }
        _ => Ok(default),
    }
}

/// Gameplay constants shared by the engine, dispatcher and scheduler
#[derive(Debug, Clone)]
pub struct GameRules {
    pub tick_period: Duration,
    pub start_room: u32,
    pub respawn_room: u32,
    /// Probability that `flee` succeeds
    pub flee_chance: f64,
    /// Unengaged monsters wander once every N ticks
    pub wander_every: u64,
    pub regen_every: u64,
    pub autosave_every: u64,
    pub repop_every: u64,
    pub login_timeout_ticks: u64,
    pub max_players: usize,
    pub min_admin_level: u8,
    pub heartbeat: HeartbeatPolicy,
    /// Ticks a character may wait on its own turn before auto-attacking
    pub auto_attack_delay: u64,
    /// Maximum room distance a wandering monster strays from home
    pub leash_radius: usize,
    pub move_cooldown: u64,
    pub use_cooldown: u64,
    pub search_cooldown: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(500),
            start_room: 1,
            respawn_room: 2,
            flee_chance: 0.5,
            wander_every: 8,
            regen_every: 4,
            autosave_every: 120,
            repop_every: 60,
            login_timeout_ticks: 240,
            max_players: 64,
            min_admin_level: 2,
            heartbeat: HeartbeatPolicy::OnChange,
            auto_attack_delay: 2,
            leash_radius: 2,
            move_cooldown: 1,
            use_cooldown: 2,
            search_cooldown: 4,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid socket address in {0}")]
    InvalidAddress(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_derive_tick_counts_from_durations() {
        let rules = Config::sample().rules();
        assert_eq!(rules.tick_period, Duration::from_millis(250));
        assert_eq!(rules.login_timeout_ticks, 120);
        assert_eq!(rules.heartbeat, HeartbeatPolicy::EveryTick);
        assert_eq!(rules.min_admin_level, 3);
        assert!((rules.flee_chance - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_frequencies_are_clamped() {
        let rules = Config::sample().rules();
        assert_eq!(rules.wander_every, 1);
    }

    #[test]
    fn defaults_match_documented_values() {
        let rules = GameRules::default();
        assert_eq!(rules.tick_period, Duration::from_millis(500));
        assert_eq!(rules.respawn_room, 2);
        assert_eq!(rules.move_cooldown, 1);
        assert_eq!(rules.use_cooldown, 2);
        assert_eq!(rules.search_cooldown, 4);
    }
}
