//! TOML-based game configuration.
//!
//! Stores the pacing of a game session:
//! - Level duration, number of levels and tolerated mistakes
//! - Incident spawner pacing and dispatch-call solve times
//! - Solve times of calls redistributed by the dispatch desk
//! - Scheduler tick and simulation time scale
//! - Timer image strip size
//!
//! Configuration is stored at `~/.config/incidentdesk/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};

/// Largest accepted `timing.time_scale`.
pub const MAX_TIME_SCALE: f64 = 1_000.0;
/// Largest accepted `timing.tick_ms`.
pub const MAX_TICK_MS: u64 = 60_000;
/// Largest accepted spawner delay, in seconds.
pub const MAX_BETWEEN_SECS: u64 = 3_600;

/// How the spawner spaces incidents over a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
    /// Inter-arrival window shrinks to half as the level runs out.
    Accelerating,
    /// Inter-arrival window stays at its configured size.
    Fixed,
}

/// Level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default = "default_level_duration")]
    pub duration_secs: u64,
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    #[serde(default = "default_max_mistakes")]
    pub max_mistakes: u32,
}

/// Incident spawner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnerConfig {
    #[serde(default = "default_pacing")]
    pub pacing: PacingMode,
    /// Delay before the first call of a level, independent of pacing.
    #[serde(default = "default_first_incident_delay")]
    pub first_incident_delay_secs: u64,
    #[serde(default = "default_min_between")]
    pub min_between_secs: u64,
    #[serde(default = "default_max_between")]
    pub max_between_secs: u64,
    /// Allotted time of a dispatch call.
    #[serde(default = "default_call_min_solve")]
    pub min_solve_secs: u64,
    #[serde(default = "default_call_max_solve")]
    pub max_solve_secs: u64,
}

/// Solve times for incidents created by the dispatch desk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionConfig {
    #[serde(default = "default_redistributed_min_solve")]
    pub min_solve_secs: u64,
    #[serde(default = "default_redistributed_max_solve")]
    pub max_solve_secs: u64,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Simulated seconds per wall-clock second.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_timer_frames")]
    pub timer_frames: usize,
}

/// Game configuration.
///
/// Serialized to/from TOML at `~/.config/incidentdesk/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seed for every random draw of a session; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub level: LevelConfig,
    #[serde(default)]
    pub spawner: SpawnerConfig,
    #[serde(default)]
    pub redistribution: RedistributionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

// Default functions
fn default_level_duration() -> u64 {
    300
}
fn default_max_levels() -> u32 {
    3
}
fn default_max_mistakes() -> u32 {
    10
}
fn default_pacing() -> PacingMode {
    PacingMode::Accelerating
}
fn default_first_incident_delay() -> u64 {
    2
}
fn default_min_between() -> u64 {
    1
}
fn default_max_between() -> u64 {
    30
}
fn default_call_min_solve() -> u64 {
    5
}
fn default_call_max_solve() -> u64 {
    60
}
fn default_redistributed_min_solve() -> u64 {
    60
}
fn default_redistributed_max_solve() -> u64 {
    300
}
fn default_tick_ms() -> u64 {
    250
}
fn default_time_scale() -> f64 {
    1.0
}
fn default_timer_frames() -> usize {
    crate::display::DEFAULT_TIMER_FRAMES
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_level_duration(),
            max_levels: default_max_levels(),
            max_mistakes: default_max_mistakes(),
        }
    }
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            pacing: default_pacing(),
            first_incident_delay_secs: default_first_incident_delay(),
            min_between_secs: default_min_between(),
            max_between_secs: default_max_between(),
            min_solve_secs: default_call_min_solve(),
            max_solve_secs: default_call_max_solve(),
        }
    }
}

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self {
            min_solve_secs: default_redistributed_min_solve(),
            max_solve_secs: default_redistributed_max_solve(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            time_scale: default_time_scale(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timer_frames: default_timer_frames(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: None,
            level: LevelConfig::default(),
            spawner: SpawnerConfig::default(),
            redistribution: RedistributionConfig::default(),
            timing: TimingConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

fn check_positive(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(())
}

fn check_at_most(field: &str, value: u64, limit: u64) -> Result<(), ValidationError> {
    if value > limit {
        return Err(ValidationError::InvalidValue {
            field: field.into(),
            message: format!("must be at most {limit}, got {value}"),
        });
    }
    Ok(())
}

fn check_range(field: &str, min: u64, max: u64) -> Result<(), ValidationError> {
    if min > max {
        return Err(ValidationError::InvalidRange {
            field: field.into(),
            min,
            max,
        });
    }
    Ok(())
}

impl LevelConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_positive("level.duration_secs", self.duration_secs)?;
        check_positive("level.max_levels", u64::from(self.max_levels))?;
        check_positive("level.max_mistakes", u64::from(self.max_mistakes))
    }
}

impl SpawnerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_positive("spawner.first_incident_delay_secs", self.first_incident_delay_secs)?;
        check_at_most(
            "spawner.first_incident_delay_secs",
            self.first_incident_delay_secs,
            MAX_BETWEEN_SECS,
        )?;
        check_positive("spawner.min_between_secs", self.min_between_secs)?;
        check_at_most("spawner.max_between_secs", self.max_between_secs, MAX_BETWEEN_SECS)?;
        check_range(
            "spawner.between_secs",
            self.min_between_secs,
            self.max_between_secs,
        )?;
        check_positive("spawner.min_solve_secs", self.min_solve_secs)?;
        check_range("spawner.solve_secs", self.min_solve_secs, self.max_solve_secs)
    }
}

impl RedistributionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_positive("redistribution.min_solve_secs", self.min_solve_secs)?;
        check_range(
            "redistribution.solve_secs",
            self.min_solve_secs,
            self.max_solve_secs,
        )
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_positive("timing.tick_ms", self.tick_ms)?;
        check_at_most("timing.tick_ms", self.tick_ms, MAX_TICK_MS)?;
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "timing.time_scale".into(),
                message: format!("must be a positive number, got {}", self.time_scale),
            });
        }
        if self.time_scale > MAX_TIME_SCALE {
            return Err(ValidationError::InvalidValue {
                field: "timing.time_scale".into(),
                message: format!("must be at most {MAX_TIME_SCALE}, got {}", self.time_scale),
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    // Optional numbers (the seed) serialize as null when unset;
                    // `none` clears them whatever their current value.
                    serde_json::Value::Number(_) | serde_json::Value::Null => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| {
                                    invalid(format!("cannot parse '{value}' as number"))
                                })?
                        } else if value == "none" {
                            serde_json::Value::Null
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot assign a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default location of the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return default, writing the default on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load and validate the config stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Check every section; the first offending field is reported.
    ///
    /// # Errors
    ///
    /// Returns an error naming the invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level.validate()?;
        self.spawner.validate()?;
        self.redistribution.validate()?;
        self.timing.validate()?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, keeping the field's type.
    /// The change is applied in memory only if the result validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
