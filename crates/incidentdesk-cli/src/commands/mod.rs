pub mod config;
pub mod simulate;

use std::path::Path;

use incidentdesk_core::{Config, ConfigError};

/// Load the config at `file`, or the default location when `None`.
pub fn load_config(file: Option<&Path>) -> Result<Config, ConfigError> {
    match file {
        Some(path) if path.exists() => Config::load_from(path),
        Some(_) => Ok(Config::default()),
        None => Config::load(),
    }
}

pub fn save_config(config: &Config, file: Option<&Path>) -> Result<(), ConfigError> {
    match file {
        Some(path) => config.save_to(path),
        None => config.save(),
    }
}
