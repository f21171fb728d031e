//! Configuration file management
//!
//! The `ConfigManager` owns the location of every file `SSHDeck` keeps:
//! settings and local connections under the config directory, logs and
//! materialized keys under `~/.sshdeck`.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};

use super::settings::AppSettings;

/// Directory name under the platform config directory
const CONFIG_DIR_NAME: &str = "sshdeck";
/// Per-user data directory under home
const DATA_DIR_NAME: &str = ".sshdeck";
/// Settings file name
const SETTINGS_FILE: &str = "config.toml";
/// Local connections file name
const CONNECTIONS_FILE: &str = "connections.toml";
/// Materialized key directory name under the data directory
const KEY_DIR_NAME: &str = "xterm_keys";
/// Log file name under the data directory
const LOG_FILE: &str = "sshdeck.log";

/// Resolves paths and loads/saves settings
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager using the platform directories
    ///
    /// # Errors
    /// Returns `ConfigError::NoDirectory` if the home or config directory
    /// cannot be determined.
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoDirectory("config"))?
            .join(CONFIG_DIR_NAME);
        let data_dir = dirs::home_dir()
            .ok_or(ConfigError::NoDirectory("home"))?
            .join(DATA_DIR_NAME);
        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Creates a manager rooted at a custom directory (used by tests)
    ///
    /// Both settings and data live under `dir`.
    #[must_use]
    pub fn with_config_dir(dir: PathBuf) -> Self {
        Self {
            data_dir: dir.join(DATA_DIR_NAME),
            config_dir: dir,
        }
    }

    /// Config directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Settings file path
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Local connections file path
    #[must_use]
    pub fn connections_path(&self) -> PathBuf {
        self.config_dir.join(CONNECTIONS_FILE)
    }

    /// Default materialized key directory (`~/.sshdeck/xterm_keys`)
    #[must_use]
    pub fn default_key_dir(&self) -> PathBuf {
        self.data_dir.join(KEY_DIR_NAME)
    }

    /// Key directory honoring the `[keys] directory` override
    #[must_use]
    pub fn key_dir(&self, settings: &AppSettings) -> PathBuf {
        settings
            .keys
            .expanded_directory()
            .unwrap_or_else(|| self.default_key_dir())
    }

    /// Default log file path (`~/.sshdeck/sshdeck.log`)
    #[must_use]
    pub fn default_log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    /// Creates the config and data directories
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if a directory cannot be created.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Loads settings, returning defaults when the file does not exist
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for a malformed file and
    /// `ConfigError::Io` if it cannot be read.
    #[instrument(skip(self), fields(path = %self.settings_path().display()))]
    pub fn load_settings(&self) -> ConfigResult<AppSettings> {
        let path = self.settings_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file, using defaults");
                return Ok(AppSettings::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Writes settings to disk
    ///
    /// # Errors
    /// Returns `ConfigError` if serialization or the write fails.
    #[instrument(skip(self, settings))]
    pub fn save_settings(&self, settings: &AppSettings) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })?;
        let path = self.settings_path();
        std::fs::write(&path, content).map_err(|source| ConfigError::Io { path, source })?;
        debug!("Settings saved");
        Ok(())
    }
}
