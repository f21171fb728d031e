//! Configuration management for `SSHDeck`
//!
//! This module provides the `ConfigManager` for locating and loading
//! configuration files in TOML format.

mod manager;
pub mod settings;

pub use manager::ConfigManager;
pub use settings::{
    AppSettings, DefaultLaunchMode, KeySettings, LaunchSettings, LoggingSettings, SecretSettings,
    VaultSettings,
};
