//! Application settings
//!
//! Settings are stored in TOML. Every section has defaults so a missing
//! file, or a file with only some sections, loads cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::launcher::LaunchMode;

/// Root settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Logging settings
    pub logging: LoggingSettings,
    /// Session launch settings
    pub launch: LaunchSettings,
    /// Materialized key settings
    pub keys: KeySettings,
    /// System keyring settings
    pub secrets: SecretSettings,
    /// Vault backend settings
    pub vault: VaultSettings,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which launch mode Enter uses on the connection list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultLaunchMode {
    /// External window when a multiplexer is available, embedded otherwise
    #[default]
    Auto,
    /// Always embedded
    Embedded,
    /// Always an external window
    Window,
}

impl DefaultLaunchMode {
    /// Resolves the configured preference against the environment
    #[must_use]
    pub const fn resolve(self, external_available: bool) -> LaunchMode {
        match self {
            Self::Auto if external_available => LaunchMode::ExternalWindow,
            Self::Auto | Self::Embedded => LaunchMode::Embedded,
            Self::Window => LaunchMode::ExternalWindow,
        }
    }
}

/// Session launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Mode used by Enter
    pub default_mode: DefaultLaunchMode,
    /// Re-exec inside a new tmux session when started outside one
    pub auto_tmux: bool,
    /// SSH client binary
    pub ssh_binary: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            default_mode: DefaultLaunchMode::Auto,
            auto_tmux: true,
            ssh_binary: "ssh".to_string(),
        }
    }
}

/// Materialized key settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    /// Directory for materialized keys; `~` is expanded
    pub directory: Option<String>,
    /// Remove a materialized key once the embedded session using it ends
    pub cleanup_after_session: bool,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            directory: None,
            cleanup_after_session: true,
        }
    }
}

impl KeySettings {
    /// Configured directory with `~` and environment variables expanded
    #[must_use]
    pub fn expanded_directory(&self) -> Option<PathBuf> {
        self.directory
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| PathBuf::from(shellexpand::tilde(d).into_owned()))
    }
}

/// System keyring settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretSettings {
    /// Keep local passwords in the keyring instead of the connections file
    pub use_keyring: bool,
    /// Keyring service name
    pub service: String,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            use_keyring: true,
            service: crate::secret::DEFAULT_SERVICE.to_string(),
        }
    }
}

/// Vault backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Self-hosted server URL; `None` uses the CLI's configured server
    pub server_url: Option<String>,
    /// Account email used for login
    pub email: Option<String>,
    /// Vault CLI binary
    pub binary: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            email: None,
            binary: "bw".to_string(),
        }
    }
}

impl VaultSettings {
    /// Whether enough is configured to attempt a login
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}
