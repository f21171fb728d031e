//! Events in and effects out of the state controller

use std::path::PathBuf;

use crate::config::VaultSettings;
use crate::error::LaunchError;
use crate::launcher::{EmbeddedSession, LaunchMode};
use crate::models::ConnectionRecord;
use crate::storage::{BackendHandle, StorageOp, StorageReply};

use super::keys::Key;

/// Request token; replies carrying a stale token are dropped
pub type Token = u64;

/// Input to [`StateController::handle`](super::StateController::handle)
#[derive(Debug)]
pub enum AppEvent {
    /// A key press or paste
    Input(Key),
    /// A worker finished a task
    Completed {
        /// Token of the task
        token: Token,
        /// Task result
        reply: TaskReply,
    },
    /// The embedded session exited
    SessionEnded {
        /// Exit status, if the process ran
        exit_code: Option<i32>,
        /// Why the session could not run
        error: Option<String>,
    },
}

/// Work to run off the controller's thread
#[derive(Debug)]
pub struct Task {
    /// Token the reply must carry
    pub token: Token,
    /// What to run
    pub kind: TaskKind,
}

/// Kinds of background work
#[derive(Debug)]
pub enum TaskKind {
    /// A storage operation
    Storage {
        /// Backend to run against
        handle: BackendHandle,
        /// Operation
        op: StorageOp,
    },
    /// Resolve credentials and launch a session
    Launch {
        /// Connection to launch
        record: ConnectionRecord,
        /// Requested mode
        mode: LaunchMode,
    },
}

/// Result of a [`Task`]
#[derive(Debug)]
pub enum TaskReply {
    /// Result of [`TaskKind::Storage`]
    Storage(StorageReply),
    /// Result of [`TaskKind::Launch`]
    Launch(LaunchReply),
}

/// Result of the launch pipeline
#[derive(Debug)]
pub enum LaunchReply {
    /// No usable password was found
    PasswordRequired {
        /// Connection being launched
        record: ConnectionRecord,
        /// Requested mode
        mode: LaunchMode,
        /// Why the password was not found
        reason: String,
    },
    /// The session must run in this terminal
    Embedded {
        /// Session to run
        session: EmbeddedSession,
        /// Downgrades applied
        warnings: Vec<String>,
    },
    /// An external window was opened
    Launched {
        /// Window title
        title: String,
        /// Downgrades applied
        warnings: Vec<String>,
    },
    /// Resolving or launching failed
    Failed(LaunchError),
}

/// Side effects requested by the controller
#[derive(Debug)]
pub enum Effect {
    /// Run a task and feed its reply back as [`AppEvent::Completed`]
    Run(Task),
    /// Suspend the UI and run the session in this terminal
    EnterSession(EmbeddedSession),
    /// Delete a materialized key file
    RemoveKeyFile(PathBuf),
    /// Save updated vault settings
    PersistVaultSettings(VaultSettings),
    /// Exit the application
    Quit,
}
