use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, Result};
use crate::schedule::Zone;

pub const DEFAULT_FIRE_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOG_FILTER: &str = "chime=info";

/// Top-level config (chime.toml + CHIME_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChimeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClockConfig {
    /// IANA zone name, e.g. "Europe/Berlin". Unset means the system zone.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl ClockConfig {
    pub fn zone(&self) -> Result<Zone> {
        Zone::from_name(self.timezone.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Fallback filter used when RUST_LOG is not set.
    #[serde(default = "default_log_filter")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Buffer between the wake-up backend and the fire receiver.
    #[serde(default = "default_fire_channel_capacity")]
    pub fire_channel_capacity: usize,
    /// Whether exact wake-ups may be registered. When false, scheduling
    /// fails with a permission error.
    #[serde(default = "bool_true")]
    pub exact_alarms_allowed: bool,
    /// How often the daemon re-arms active alarms missing from the backend.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fire_channel_capacity: DEFAULT_FIRE_CHANNEL_CAPACITY,
            exact_alarms_allowed: true,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_fire_channel_capacity() -> usize {
    DEFAULT_FIRE_CHANNEL_CAPACITY
}
fn default_resync_interval_secs() -> u64 {
    DEFAULT_RESYNC_INTERVAL_SECS
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chime/chime.db", home)
}

impl ChimeConfig {
    /// Load config from a TOML file with CHIME_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. CHIME_CONFIG env var
    ///   3. ~/.chime/chime.toml
    ///
    /// Nested keys use a double underscore: `CHIME_CLOCK__TIMEZONE=UTC`.
    /// A missing file is not an error; defaults apply.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CHIME_CONFIG").ok())
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::from_figment(
            Figment::from(Serialized::defaults(ChimeConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed("CHIME_").ignore(&["config"]).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: ChimeConfig = figment
            .extract()
            .map_err(|e| AlarmError::Config(e.to_string()))?;
        // fail early on a bad zone name rather than at first schedule
        config.clock.zone()?;
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chime/chime.toml", home)
}
