//! Engine configuration.
//!
//! Configuration is resolved with precedence:
//! 1. Environment variables (`EMPATHY_*`)
//! 2. TOML file (explicit path or `EMPATHY_CONFIG`)
//! 3. Default values
//!
//! # Invariants
//! - A config returned by [`EngineConfig::load`] has passed `validate()`.

use crate::model::{DAY_MS, HOUR_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "EMPATHY_CONFIG";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    InvalidEnv { key: &'static str, value: String },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::InvalidEnv { key, value } => {
                write!(f, "environment variable {key} has invalid value `{value}`")
            }
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidEnv { .. } | Self::Invalid(_) => None,
        }
    }
}

/// Top-level configuration for matching, lifecycle and scheduling.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub lifetimes: LifetimeConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum Jaccard similarity for two diaries to share a room (inclusive).
    pub similarity_threshold: f64,
    /// Upper bound on room size.
    pub max_participants: usize,
    /// Half-width of the creation-time window, in hours.
    pub time_window_hours: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.1,
            max_participants: 5,
            time_window_hours: 24,
        }
    }
}

impl MatchingConfig {
    pub fn time_window_ms(&self) -> i64 {
        i64::from(self.time_window_hours) * HOUR_MS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeConfig {
    pub room_hours: u32,
    pub message_hours: u32,
    pub notification_days: u32,
    pub diary_hours: u32,
    /// How long before room expiry the warning scan starts notifying.
    pub warning_lead_minutes: u32,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            room_hours: 24,
            message_hours: 48,
            notification_days: 7,
            diary_hours: 24,
            warning_lead_minutes: 60,
        }
    }
}

impl LifetimeConfig {
    pub fn room_ms(&self) -> i64 {
        i64::from(self.room_hours) * HOUR_MS
    }

    pub fn message_ms(&self) -> i64 {
        i64::from(self.message_hours) * HOUR_MS
    }

    pub fn notification_ms(&self) -> i64 {
        i64::from(self.notification_days) * DAY_MS
    }

    pub fn diary_ms(&self) -> i64 {
        i64::from(self.diary_hours) * HOUR_MS
    }

    pub fn warning_lead_ms(&self) -> i64 {
        i64::from(self.warning_lead_minutes) * 60 * 1000
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Local wall-clock hours at which the matching pass fires.
    pub matching_hours: BTreeSet<u32>,
    pub warning_interval_minutes: u32,
    pub cleanup_interval_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            matching_hours: BTreeSet::from([9, 13, 20]),
            warning_interval_minutes: 60,
            cleanup_interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Rows deleted per committed batch during pruning.
    pub prune_batch_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("empathy.db"),
            prune_batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; unset keeps logging off.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl EngineConfig {
    /// Loads config from `path` (or `EMPATHY_CONFIG`), applies env overrides
    /// and validates the result. A missing implicit file falls back to
    /// defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file without env overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `EMPATHY_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("EMPATHY_SIMILARITY_THRESHOLD") {
            self.matching.similarity_threshold = parse_env("EMPATHY_SIMILARITY_THRESHOLD", value)?;
        }
        if let Some(value) = lookup("EMPATHY_MAX_PARTICIPANTS") {
            self.matching.max_participants = parse_env("EMPATHY_MAX_PARTICIPANTS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_TIME_WINDOW_HOURS") {
            self.matching.time_window_hours = parse_env("EMPATHY_TIME_WINDOW_HOURS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_ROOM_LIFETIME_HOURS") {
            self.lifetimes.room_hours = parse_env("EMPATHY_ROOM_LIFETIME_HOURS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_MESSAGE_LIFETIME_HOURS") {
            self.lifetimes.message_hours = parse_env("EMPATHY_MESSAGE_LIFETIME_HOURS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_NOTIFICATION_LIFETIME_DAYS") {
            self.lifetimes.notification_days =
                parse_env("EMPATHY_NOTIFICATION_LIFETIME_DAYS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_DIARY_LIFETIME_HOURS") {
            self.lifetimes.diary_hours = parse_env("EMPATHY_DIARY_LIFETIME_HOURS", value)?;
        }
        if let Some(value) = lookup("EMPATHY_WARNING_LEAD_MINUTES") {
            self.lifetimes.warning_lead_minutes =
                parse_env("EMPATHY_WARNING_LEAD_MINUTES", value)?;
        }
        if let Some(value) = lookup("EMPATHY_SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_env("EMPATHY_SCHEDULER_ENABLED", value)?;
        }
        if let Some(value) = lookup("EMPATHY_MATCHING_HOURS") {
            self.scheduler.matching_hours = parse_hour_list(value)?;
        }
        if let Some(value) = lookup("EMPATHY_WARNING_INTERVAL_MINUTES") {
            self.scheduler.warning_interval_minutes =
                parse_env("EMPATHY_WARNING_INTERVAL_MINUTES", value)?;
        }
        if let Some(value) = lookup("EMPATHY_CLEANUP_INTERVAL_MINUTES") {
            self.scheduler.cleanup_interval_minutes =
                parse_env("EMPATHY_CLEANUP_INTERVAL_MINUTES", value)?;
        }
        if let Some(value) = lookup("EMPATHY_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("EMPATHY_PRUNE_BATCH_SIZE") {
            self.storage.prune_batch_size = parse_env("EMPATHY_PRUNE_BATCH_SIZE", value)?;
        }
        if let Some(value) = lookup("EMPATHY_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("EMPATHY_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matching.similarity_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "matching.similarity_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.matching.max_participants < crate::model::room::MIN_PARTICIPANTS {
            return Err(ConfigError::Invalid(format!(
                "matching.max_participants must be at least 2, got {}",
                self.matching.max_participants
            )));
        }
        for (name, value) in [
            ("lifetimes.room_hours", self.lifetimes.room_hours),
            ("lifetimes.message_hours", self.lifetimes.message_hours),
            ("lifetimes.notification_days", self.lifetimes.notification_days),
            ("lifetimes.diary_hours", self.lifetimes.diary_hours),
            (
                "scheduler.warning_interval_minutes",
                self.scheduler.warning_interval_minutes,
            ),
            (
                "scheduler.cleanup_interval_minutes",
                self.scheduler.cleanup_interval_minutes,
            ),
            ("storage.prune_batch_size", self.storage.prune_batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.scheduler.matching_hours.is_empty() {
            return Err(ConfigError::Invalid(
                "scheduler.matching_hours must name at least one hour".to_string(),
            ));
        }
        if let Some(hour) = self.scheduler.matching_hours.iter().find(|hour| **hour > 23) {
            return Err(ConfigError::Invalid(format!(
                "scheduler.matching_hours entries must be within 0..=23, got {hour}"
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

fn parse_hour_list(value: String) -> Result<BTreeSet<u32>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|_| ConfigError::InvalidEnv {
            key: "EMPATHY_MATCHING_HOURS",
            value,
        })
}
