//! Environment configuration and YAML inventory loading.
//!
//! Inventory is loaded once at startup (spec §3 "Lifecycles") — there is no
//! hot-reload path, by design (spec §1 Non-goals).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{InventoryDevice, InventorySwitch};

/// Process settings, read from `NLNS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub api_host: String,
    pub api_port: u16,
    /// Case-insensitive substrings that mark a neighbor identity as a
    /// site-local unmanaged switch whose uplink should not be labeled
    /// (spec §4.4, §9 Open Question 2).
    pub uplink_label_exclusions: Vec<String>,
    pub webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config_dir: PathBuf::from("/app/config"),
            poll_interval_secs: 10,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            uplink_label_exclusions: vec!["basic_switch".to_string()],
            webhook_url: None,
        }
    }
}

impl Settings {
    /// Builds settings from the environment, falling back to the defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(dir) = std::env::var("NLNS_CONFIG_DIR") {
            settings.config_dir = PathBuf::from(dir);
        }
        if let Ok(interval) = std::env::var("NLNS_POLL_INTERVAL") {
            if let Ok(parsed) = interval.parse() {
                settings.poll_interval_secs = parsed;
            }
        }
        if let Ok(host) = std::env::var("NLNS_API_HOST") {
            settings.api_host = host;
        }
        if let Ok(port) = std::env::var("NLNS_API_PORT") {
            if let Ok(parsed) = port.parse() {
                settings.api_port = parsed;
            }
        }
        if let Ok(url) = std::env::var("NLNS_WEBHOOK_URL") {
            settings.webhook_url = Some(url);
        }

        settings
    }
}

#[derive(Debug, Deserialize, Default)]
struct SwitchesFile {
    #[serde(default)]
    switches: Vec<InventorySwitch>,
}

#[derive(Debug, Deserialize, Default)]
struct DevicesFile {
    #[serde(default)]
    devices: Vec<InventoryDevice>,
}

/// Loads `switches.yaml` from `config_dir`. A missing file, or a file
/// lacking the top-level `switches` key, yields an empty list rather than
/// an error (spec §6, §7 "Config file missing").
pub fn load_switches(config_dir: &Path) -> Result<Vec<InventorySwitch>, ConfigError> {
    load_yaml::<SwitchesFile>(&config_dir.join("switches.yaml")).map(|f| f.switches)
}

/// Loads `devices.yaml` from `config_dir`, with the same empty-on-absence
/// semantics as [`load_switches`].
pub fn load_devices(config_dir: &Path) -> Result<Vec<InventoryDevice>, ConfigError> {
    load_yaml::<DevicesFile>(&config_dir.join("devices.yaml")).map(|f| f.devices)
}

fn load_yaml<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
