use std::path::Path;

use clap::Subcommand;
use incidentdesk_core::Config;

use super::{load_config, save_config};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "level.duration_secs", "spawner.pacing")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction, file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config(file)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = load_config(file)?;
            config.set(&key, &value)?;
            save_config(&config, file)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = load_config(file)?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            save_config(&Config::default(), file)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
