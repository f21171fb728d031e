//! Error types for `SSHDeck`
//!
//! Each layer has its own error enum; [`SshDeckError`] wraps them at the
//! crate boundary. [`ErrorKind`] classifies failures the way the state
//! controller reports them to the user.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum SshDeckError {
    /// Configuration could not be initialized
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Secret store failure
    #[error("Secret store error: {0}")]
    Secret(#[from] SecretError),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session launch failure
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home or config directory could be determined
    #[error("Cannot determine {0} directory")]
    NoDirectory(&'static str),

    /// Settings file exists but could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// Settings file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(String),

    /// Settings could not be read or written
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Secret store errors
#[derive(Debug, Error)]
pub enum SecretError {
    /// The platform keyring cannot be reached
    #[error("Secret store unavailable: {0}")]
    BackendUnavailable(String),

    /// Reading a secret failed
    #[error("Failed to retrieve secret: {0}")]
    RetrieveFailed(String),

    /// Writing a secret failed
    #[error("Failed to store secret: {0}")]
    StoreFailed(String),

    /// Deleting a secret failed
    #[error("Failed to delete secret: {0}")]
    DeleteFailed(String),
}

/// Result type for secret store operations
pub type SecretResult<T> = Result<T, SecretError>;

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend tool or file cannot be used
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Authentication was rejected
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The vault is locked or the session expired
    #[error("Vault is locked")]
    Locked,

    /// An external command returned a failure
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Backend output could not be parsed
    #[error("Failed to parse backend output: {0}")]
    Parse(String),

    /// No record with the given ID exists
    #[error("Connection not found: {0}")]
    NotFound(String),

    /// The operation is not offered by this backend
    #[error("Operation not supported by the {backend} backend: {operation}")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Local file access failed
    #[error("IO error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Session launch errors
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The process could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The wrapper process exited with a failure
    #[error("{program} exited with an error: {message}")]
    Failed {
        /// Program that failed
        program: String,
        /// Captured stderr or exit status
        message: String,
    },

    /// No launch strategy can serve the request
    #[error("No terminal multiplexer is available for an external window")]
    NoMultiplexer,

    /// Writing the private key to disk failed
    #[error("Failed to materialize key file {path}: {source}")]
    KeyMaterialization {
        /// Target key path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// An argument could not be quoted for the shell
    #[error("Cannot quote argument for the shell: {0}")]
    Quote(String),
}

/// Result type for launch operations
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Classification of recoverable failures as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Startup configuration failure (fatal, never reaches the controller)
    ConfigInit,
    /// Vault login or unlock failed
    BackendAuth,
    /// Listing connections, organizations or collections failed
    BackendLoad,
    /// A credential is needed from the user
    CredentialUnavailable,
    /// Starting the session process failed
    Launch,
    /// Add, edit or delete failed
    Persistence,
}

impl ErrorKind {
    /// Short label used as a message prefix
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConfigInit => "Configuration",
            Self::BackendAuth => "Authentication",
            Self::BackendLoad => "Load",
            Self::CredentialUnavailable => "Credential",
            Self::Launch => "Launch",
            Self::Persistence => "Save",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
