//! `SSHDeck` Core Library
//!
//! This crate provides everything behind the `sshdeck` terminal UI: the
//! application state machine, storage backends, credential resolution and
//! session launching. The binary only renders and feeds key events in.
//!
//! # Crate Structure
//!
//! - [`app`] - State controller, widgets, events, effects and the task executor
//! - [`models`] - Connection records and vault hierarchy types
//! - [`config`] - Settings and file locations
//! - [`storage`] - Local file and Bitwarden vault backends
//! - [`secret`] - Keyring access, credential resolution, key materialization
//! - [`launcher`] - Launch strategies for embedded sessions and external windows
//! - [`logging`] - `tracing` subscriber setup

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod models;
pub mod secret;
pub mod storage;

pub use app::{AppEvent, AppState, ControllerConfig, Effect, StateController, TaskRunner};
pub use config::{AppSettings, ConfigManager};
pub use error::{
    ConfigError, ConfigResult, ErrorKind, LaunchError, LaunchResult, SecretError, SecretResult,
    SshDeckError, StorageError, StorageResult,
};
pub use launcher::{LaunchEnvironment, LaunchMode, Platform, SessionLauncher};
pub use models::{ConnectionRecord, VaultScope};
pub use secret::{CredentialResolver, KeyMaterializer};
pub use storage::{BackendFactory, StorageBackend, StorageOp, StorageReply, SystemBackends};
