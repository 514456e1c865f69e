//! Server configuration, read from the environment by the binary.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};
use trivia_room::{MemoryTriviaStore, RoomConfig, StoreError};

/// Address the server binds to when `TRIVIA_BIND` is unset.
pub const DEFAULT_BIND: &str = "127.0.0.1:3007";

const BIND_ENV: &str = "TRIVIA_BIND";
const DATA_ENV: &str = "TRIVIA_DATA";
const ROUND_SECS_ENV: &str = "TRIVIA_ROUND_SECS";
const MAX_PLAYERS_ENV: &str = "TRIVIA_MAX_PLAYERS";
const IDLE_SECS_ENV: &str = "TRIVIA_IDLE_SECS";
const SWEEP_SECS_ENV: &str = "TRIVIA_SWEEP_SECS";

/// Everything needed to run a [`TriviaServer`](crate::TriviaServer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// JSON file of trivia sets loaded at startup.
    pub trivia_path: Option<PathBuf>,
    pub room: RoomConfig,
    /// Rooms without commands for this long are evicted unless a game is
    /// running.
    pub idle_timeout: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
    /// A connection that sends nothing for this long is closed.
    pub read_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            trivia_path: None,
            room: RoomConfig::default(),
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            read_timeout: Duration::from_secs(120),
        }
    }
}

impl ServerConfig {
    /// Reads the `TRIVIA_*` variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            config.bind_addr = bind.trim().to_string();
        }
        if let Some(path) = lookup(DATA_ENV).filter(|v| !v.trim().is_empty()) {
            config.trivia_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ROUND_SECS_ENV) {
            config.room.round_time = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, MAX_PLAYERS_ENV) {
            config.room.max_players = max;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, IDLE_SECS_ENV) {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, SWEEP_SECS_ENV) {
            config.sweep_interval = Duration::from_secs(secs);
        }
        config
    }

    /// Loads the trivia store from [`trivia_path`](Self::trivia_path), or
    /// returns an empty store when no path is set.
    pub fn load_store(&self) -> Result<MemoryTriviaStore, StoreError> {
        let Some(path) = &self.trivia_path else {
            warn!("no trivia file configured; starting with an empty store");
            return Ok(MemoryTriviaStore::new());
        };
        let store = MemoryTriviaStore::load(path).inspect_err(|err| {
            warn!(path = %path.display(), error = %err, "failed to load trivia file");
        })?;
        info!(path = %path.display(), "loaded trivia file");
        Ok(store)
    }
}

/// Parses a positive value, warning about anything else.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr + PartialEq + Default,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            warn!(var = name, value = %raw, "ignoring invalid value; using default");
            None
        }
    }
}
