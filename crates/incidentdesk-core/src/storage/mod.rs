mod config;

pub use config::{
    Config, DisplayConfig, LevelConfig, PacingMode, RedistributionConfig, SpawnerConfig,
    TimingConfig, MAX_BETWEEN_SECS, MAX_TICK_MS, MAX_TIME_SCALE,
};

use std::path::PathBuf;

/// Returns `~/.config/incidentdesk[-dev]/` based on INCIDENTDESK_ENV.
///
/// Set INCIDENTDESK_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("INCIDENTDESK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("incidentdesk-dev")
    } else {
        base_dir.join("incidentdesk")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
