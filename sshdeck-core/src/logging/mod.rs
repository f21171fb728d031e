//! Tracing integration for structured logging
//!
//! The TUI owns the terminal, so the binary logs to a file. The file path
//! and filter can be overridden from the environment.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable selecting an alternate log file
pub const LOG_FILE_ENV: &str = "SSHDECK_LOG_FILE";
/// Environment variable overriding the log filter
pub const LOG_FILTER_ENV: &str = "SSHDECK_LOG";

/// Global flag indicating whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    InitializationFailed(String),

    /// Tracing already initialized
    #[error("Tracing has already been initialized")]
    AlreadyInitialized,

    /// Failed to create log file
    #[error("Failed to create log file {path}: {reason}")]
    FileCreationFailed {
        /// Log file path
        path: PathBuf,
        /// OS error message
        reason: String,
    },
}

/// Result type for tracing operations
pub type TracingResult<T> = Result<T, TracingError>;

/// Tracing log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingLevel {
    /// Error level - only errors
    Error,
    /// Warn level - errors and warnings
    Warn,
    /// Info level - errors, warnings, and info (default)
    #[default]
    Info,
    /// Debug level - all above plus debug messages
    Debug,
    /// Trace level - all messages including trace
    Trace,
}

impl TracingLevel {
    /// Converts to tracing crate's Level
    #[must_use]
    pub const fn to_tracing_level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for TracingLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Output destination for tracing logs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TracingOutput {
    /// Output to stdout
    Stdout,
    /// Output to stderr
    #[default]
    Stderr,
    /// Append to a file
    File {
        /// Path to the log file
        path: PathBuf,
    },
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Log level
    pub level: TracingLevel,
    /// Output destination
    pub output: TracingOutput,
    /// Whether to include thread IDs
    pub thread_ids: bool,
    /// Custom filter string (overrides level if set)
    pub filter: Option<String>,
}

impl TracingConfig {
    /// Creates a new tracing configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log level
    #[must_use]
    pub const fn with_level(mut self, level: TracingLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output destination
    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables thread IDs
    #[must_use]
    pub const fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Sets a custom filter string
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Configuration for the TUI: file output, environment overrides applied
    ///
    /// `SSHDECK_LOG_FILE` replaces `default_path`; `SSHDECK_LOG` replaces the
    /// filter built from `level`.
    #[must_use]
    pub fn for_tui(level: &str, default_path: &Path) -> Self {
        let path = std::env::var_os(LOG_FILE_ENV)
            .filter(|p| !p.is_empty())
            .map_or_else(|| default_path.to_path_buf(), PathBuf::from);
        let mut config = Self::new()
            .with_level(level.parse().unwrap_or_default())
            .with_output(TracingOutput::File { path });
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV)
            && !filter.trim().is_empty()
        {
            config = config.with_filter(filter);
        }
        config
    }

    fn env_filter(&self) -> TracingResult<EnvFilter> {
        match self.filter {
            Some(ref custom) => EnvFilter::try_new(custom)
                .map_err(|e| TracingError::InitializationFailed(e.to_string())),
            None => Ok(EnvFilter::try_new(format!(
                "sshdeck={level},sshdeck_core={level}",
                level = self.level
            ))
            .unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

/// Initializes the tracing subscriber with the given configuration
///
/// # Errors
///
/// Returns an error if tracing has already been initialized, the log file
/// cannot be created, or the subscriber fails to install.
pub fn init_tracing(config: &TracingConfig) -> TracingResult<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(TracingError::AlreadyInitialized);
    }

    let filter = config.env_filter()?;
    let layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(config.thread_ids);

    match &config.output {
        TracingOutput::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stdout))
            .try_init(),
        TracingOutput::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr))
            .try_init(),
        TracingOutput::File { path } => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.with_ansi(false).with_writer(file))
                .try_init()
        }
    }
    .map_err(|e| TracingError::InitializationFailed(e.to_string()))?;

    tracing::info!(level = %config.level, "Tracing initialized");
    Ok(())
}

fn open_log_file(path: &Path) -> TracingResult<std::fs::File> {
    let fail = |e: std::io::Error| TracingError::FileCreationFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(fail)
}

/// Checks if tracing has been initialized
#[must_use]
pub fn is_tracing_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::SeqCst)
}

/// Standard span names for `SSHDeck` operations
pub mod span_names {
    /// Storage load span
    pub const STORAGE_LOAD: &str = "storage.load";
    /// Storage write span (add, edit, delete)
    pub const STORAGE_WRITE: &str = "storage.write";
    /// Vault authentication span
    pub const VAULT_AUTH: &str = "vault.auth";
    /// Credential resolution span
    pub const CREDENTIAL_RESOLVE: &str = "credential.resolve";
    /// Session launch span
    pub const SESSION_LAUNCH: &str = "session.launch";
    /// Embedded session span
    pub const SESSION_EMBEDDED: &str = "session.embedded";
}

/// Records the names of spans created while it is the default subscriber
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct SpanRecorder(std::sync::Arc<std::sync::Mutex<Vec<&'static str>>>);

#[cfg(test)]
impl SpanRecorder {
    /// Installs the recorder for the current thread
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanRecorder {
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.0.lock().unwrap().push(attrs.metadata().name());
    }
}
