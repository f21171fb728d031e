//! Fatal errors and exit codes

use sshdeck_core::ConfigError;

/// Exit codes for fatal errors
pub mod exit_codes {
    /// General error - terminal setup, runtime or other non-configuration errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Configuration could not be initialized
    pub const CONFIG_ERROR: i32 = 2;
}

/// Errors that end the program
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Settings or directories could not be initialized
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The terminal could not be set up or restored
    #[error("Terminal error: {0}")]
    Terminal(#[source] std::io::Error),

    /// The async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[source] std::io::Error),

    /// Re-executing inside tmux failed
    #[error("Failed to start tmux: {0}")]
    Multiplexer(#[source] std::io::Error),
}

impl AppError {
    /// Returns the exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => exit_codes::CONFIG_ERROR,
            Self::Terminal(_) | Self::Runtime(_) | Self::Multiplexer(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
