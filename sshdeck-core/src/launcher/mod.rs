//! Session launching
//!
//! A launch picks one [`LaunchStrategy`] from the platform and the
//! requested [`LaunchMode`], then specialises the command by auth kind:
//!
//! | Platform | Mode | Strategy |
//! |---|---|---|
//! | any | embedded | [`LaunchStrategy::Embedded`] |
//! | Unix | external window, multiplexer available | [`LaunchStrategy::MultiplexerWindow`] |
//! | Unix | external window, no multiplexer | [`LaunchStrategy::Embedded`] with a warning |
//! | Windows | external window | [`LaunchStrategy::WindowsConsole`] |
//!
//! Password helpers (`sshpass`, `plink`) are looked up right before the
//! command is built. A missing helper degrades the command and adds a
//! warning; it never aborts the launch.

mod command;
mod session;
mod tools;

pub use command::{cmd_arg, console_title, push_plink_args, shell_command, ssh_args};
pub use session::{EmbeddedSession, LaunchOutcome, LaunchPlan, PlannedAction, SessionLauncher};
pub use tools::{ProcessSpawner, SpawnCommand, SystemSpawner, ToolProbe, WhichProbe};

/// tmux binary
pub const TMUX: &str = "tmux";
/// Password helper for OpenSSH
pub const SSHPASS: &str = "sshpass";
/// PuTTY command-line client
pub const PLINK: &str = "plink";
/// Set by tmux inside a tmux session
pub const TMUX_ENV: &str = "TMUX";

/// Where the session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Take over the current terminal until the session ends
    Embedded,
    /// Open a separate window and return to the list
    ExternalWindow,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::ExternalWindow => f.write_str("window"),
        }
    }
}

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux, macOS and other Unix-likes
    Unix,
    /// Windows
    Windows,
}

impl Platform {
    /// Platform this binary was built for
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }
}

/// Launch-relevant facts about the environment, detected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchEnvironment {
    /// Operating system family
    pub platform: Platform,
    /// Running inside a terminal multiplexer that can open windows
    pub multiplexer_available: bool,
}

impl LaunchEnvironment {
    /// Creates an environment description
    #[must_use]
    pub const fn new(platform: Platform, multiplexer_available: bool) -> Self {
        Self {
            platform,
            multiplexer_available,
        }
    }

    /// Detects the current environment
    ///
    /// A multiplexer counts as available when the process runs inside tmux
    /// and the `tmux` binary can be found.
    #[must_use]
    pub fn detect(probe: &dyn ToolProbe) -> Self {
        let platform = Platform::current();
        let multiplexer_available = platform == Platform::Unix
            && std::env::var_os(TMUX_ENV).is_some_and(|v| !v.is_empty())
            && probe.find(TMUX).is_some();
        Self::new(platform, multiplexer_available)
    }

    /// Whether an external window can be opened at all
    #[must_use]
    pub const fn external_available(&self) -> bool {
        match self.platform {
            Platform::Windows => true,
            Platform::Unix => self.multiplexer_available,
        }
    }
}

/// Concrete way a session is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// SSH client in the current terminal
    Embedded,
    /// New tmux window
    MultiplexerWindow,
    /// New Windows console through `start`
    WindowsConsole,
}

impl LaunchStrategy {
    /// Selects the strategy for `mode` in `env`
    ///
    /// Returns a warning when the request had to be downgraded.
    #[must_use]
    pub fn select(env: &LaunchEnvironment, mode: LaunchMode) -> (Self, Option<String>) {
        match (env.platform, mode) {
            (_, LaunchMode::Embedded) => (Self::Embedded, None),
            (Platform::Windows, LaunchMode::ExternalWindow) => (Self::WindowsConsole, None),
            (Platform::Unix, LaunchMode::ExternalWindow) if env.multiplexer_available => {
                (Self::MultiplexerWindow, None)
            }
            (Platform::Unix, LaunchMode::ExternalWindow) => (
                Self::Embedded,
                Some("Not running inside tmux; opening the session here instead".to_string()),
            ),
        }
    }

    /// Whether the session takes over the current terminal
    #[must_use]
    pub const fn is_embedded(self) -> bool {
        matches!(self, Self::Embedded)
    }
}
