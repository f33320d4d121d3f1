use crate::coordinator::{DEFAULT_TIMEOUT, DEFAULT_UPDATE_INTERVAL};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load variables from a `.env` file in the working directory.
///
/// Variables already present in the environment win. Values may contain
/// spaces without quoting; matching surrounding quotes are stripped.
/// Returns how many variables were set.
pub fn load_dotenv() -> usize {
    load_dotenv_from(Path::new(".env"))
}

pub fn load_dotenv_from(path: &Path) -> usize {
    let Ok(content) = fs::read_to_string(path) else {
        return 0;
    };

    let mut loaded = 0;
    for (key, value) in parse_dotenv(&content) {
        if std::env::var_os(key).is_none() {
            // SAFETY: called from main before the async runtime spawns threads
            unsafe { std::env::set_var(key, value) };
            loaded += 1;
        }
    }
    loaded
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address of the monitor's web panel, optionally with a port.
    pub host: String,
    /// Stable identifier, usually the device's MAC address.
    pub unique_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub update_interval_secs: u64,
    pub timeout_secs: u64,
}

impl RefreshConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                host: "192.168.1.100".to_string(),
                unique_id: None,
            },
            refresh: RefreshConfig {
                update_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs(),
                timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("NAM_HOST") {
            config.device.host = host;
        }
        if let Some(unique_id) = lookup("NAM_UNIQUE_ID")
            && !unique_id.trim().is_empty()
        {
            config.device.unique_id = Some(unique_id.trim().to_string());
        }
        if let Some(secs) = parse_secs(&lookup, "NAM_UPDATE_INTERVAL_SECS") {
            config.refresh.update_interval_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "NAM_TIMEOUT_SECS") {
            config.refresh.timeout_secs = secs;
        }

        config
    }
}

/// Positive number of seconds, or `None` with a warning.
fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive number of seconds", key, raw);
            None
        }
    }
}
