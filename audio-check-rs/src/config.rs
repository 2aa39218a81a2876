//! Command line and settings file.

use crate::audio::monitor::DEFAULT_POLL_INTERVAL;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about = "Shows the attached audio device and its volume", long_about = None)]
pub struct Cli {
    /// Only consider devices whose name or identifier contains this text
    pub filter: Option<String>,
}

/// Which collaborator serves device queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Built-in Core Audio collaborator
    #[default]
    Builtin,
    /// Native library exporting the `Ac*` contract
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub backend: Backend,
    pub library_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub include_capture: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Builtin,
            library_path: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            include_capture: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    /// Native library to load, defaulting to the platform name of `audio_controller`.
    pub fn library_path(&self) -> PathBuf {
        self.library_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(libloading::library_filename("audio_controller")))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory on this system")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Location of the settings file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// `<config_dir>/audio-check/config.toml`
    pub fn new() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::at(dir.join("audio-check").join("config.toml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings. A missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Settings from the default location, or the defaults when the platform
/// has no configuration directory.
pub fn load_settings() -> Result<Settings, ConfigError> {
    settings_from(SettingsStore::new())
}

fn settings_from(store: Result<SettingsStore, ConfigError>) -> Result<Settings, ConfigError> {
    match store {
        Ok(store) => {
            let settings = store.load()?;
            debug!(path = %store.path().display(), ?settings, "Settings resolved");
            Ok(settings)
        }
        Err(ConfigError::NoConfigDir) => {
            warn!("No configuration directory, using default settings");
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}
