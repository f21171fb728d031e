//! Application states
//!
//! Exactly one [`AppState`] is active. It owns the widget that receives
//! input in that state.

use std::path::PathBuf;

use crate::launcher::LaunchMode;
use crate::models::{Collection, ConnectionRecord, Organization};

use super::widgets::{FormState, SelectList};

/// Entry of the storage selection list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageChoice {
    /// Local connection file
    Local,
    /// Bitwarden vault
    Vault,
}

impl StorageChoice {
    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Local => "Local connections",
            Self::Vault => "Bitwarden vault",
        }
    }
}

/// Entry of the organization list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationEntry {
    /// The account's own vault
    Personal,
    /// An organization
    Organization(Organization),
}

impl OrganizationEntry {
    /// Display label
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Personal => "Personal vault",
            Self::Organization(org) => &org.name,
        }
    }
}

/// The active application state
#[derive(Debug, Clone)]
pub enum AppState {
    /// Choose local or vault storage (root)
    StorageSelect(SelectList<StorageChoice>),
    /// Enter vault server and account
    VaultConfig(FormState),
    /// Log in to the vault
    VaultLogin(FormState),
    /// Unlock a logged-in vault
    VaultUnlock(FormState),
    /// Choose the personal vault or an organization
    OrganizationSelect(SelectList<OrganizationEntry>),
    /// Choose a collection of `organization`
    CollectionSelect {
        /// Organization the collections belong to
        organization: Organization,
        /// Collections
        list: SelectList<Collection>,
    },
    /// Browse connections; the list widget lives in the controller
    ConnectionList,
    /// New connection form
    AddConnection(FormState),
    /// Edit form for the connection with `id`
    EditConnection {
        /// Record being edited
        id: String,
        /// Form prefilled from the record
        form: FormState,
    },
    /// Confirm deletion of a connection
    ConfirmDelete {
        /// Record ID
        id: String,
        /// Record name
        name: String,
    },
    /// Ask for a password the resolver could not find
    PasswordPrompt {
        /// Connection being launched
        record: ConnectionRecord,
        /// Requested mode
        mode: LaunchMode,
        /// Password form
        form: FormState,
    },
    /// An embedded session owns the terminal
    LiveSession {
        /// Session title
        title: String,
        /// Key file to remove when the session ends
        materialized_key: Option<PathBuf>,
    },
}

/// Data-free tag of an [`AppState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// See [`AppState::StorageSelect`]
    StorageSelect,
    /// See [`AppState::VaultConfig`]
    VaultConfig,
    /// See [`AppState::VaultLogin`]
    VaultLogin,
    /// See [`AppState::VaultUnlock`]
    VaultUnlock,
    /// See [`AppState::OrganizationSelect`]
    OrganizationSelect,
    /// See [`AppState::CollectionSelect`]
    CollectionSelect,
    /// See [`AppState::ConnectionList`]
    ConnectionList,
    /// See [`AppState::AddConnection`]
    AddConnection,
    /// See [`AppState::EditConnection`]
    EditConnection,
    /// See [`AppState::ConfirmDelete`]
    ConfirmDelete,
    /// See [`AppState::PasswordPrompt`]
    PasswordPrompt,
    /// See [`AppState::LiveSession`]
    LiveSession,
}

impl StateKind {
    /// Every state
    pub const ALL: [Self; 12] = [
        Self::StorageSelect,
        Self::VaultConfig,
        Self::VaultLogin,
        Self::VaultUnlock,
        Self::OrganizationSelect,
        Self::CollectionSelect,
        Self::ConnectionList,
        Self::AddConnection,
        Self::EditConnection,
        Self::ConfirmDelete,
        Self::PasswordPrompt,
        Self::LiveSession,
    ];

    /// State Escape returns to
    ///
    /// `connection_list_parent` is where the connection list itself
    /// returns, which depends on the backend and its scope. The root and
    /// the live session have no parent.
    #[must_use]
    pub const fn parent(self, connection_list_parent: Self) -> Option<Self> {
        match self {
            Self::StorageSelect | Self::LiveSession => None,
            Self::VaultConfig | Self::VaultLogin | Self::VaultUnlock | Self::OrganizationSelect => {
                Some(Self::StorageSelect)
            }
            Self::CollectionSelect => Some(Self::OrganizationSelect),
            Self::ConnectionList => Some(connection_list_parent),
            Self::AddConnection | Self::EditConnection | Self::ConfirmDelete | Self::PasswordPrompt => {
                Some(Self::ConnectionList)
            }
        }
    }

    /// Whether the state's widget consumes printable characters as text
    #[must_use]
    pub const fn takes_text(self) -> bool {
        matches!(
            self,
            Self::VaultConfig
                | Self::VaultLogin
                | Self::VaultUnlock
                | Self::AddConnection
                | Self::EditConnection
                | Self::PasswordPrompt
        )
    }
}

impl AppState {
    /// Tag of this state
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::StorageSelect(_) => StateKind::StorageSelect,
            Self::VaultConfig(_) => StateKind::VaultConfig,
            Self::VaultLogin(_) => StateKind::VaultLogin,
            Self::VaultUnlock(_) => StateKind::VaultUnlock,
            Self::OrganizationSelect(_) => StateKind::OrganizationSelect,
            Self::CollectionSelect { .. } => StateKind::CollectionSelect,
            Self::ConnectionList => StateKind::ConnectionList,
            Self::AddConnection(_) => StateKind::AddConnection,
            Self::EditConnection { .. } => StateKind::EditConnection,
            Self::ConfirmDelete { .. } => StateKind::ConfirmDelete,
            Self::PasswordPrompt { .. } => StateKind::PasswordPrompt,
            Self::LiveSession { .. } => StateKind::LiveSession,
        }
    }

    /// Root state
    #[must_use]
    pub fn storage_select() -> Self {
        Self::StorageSelect(SelectList::new(vec![
            StorageChoice::Local,
            StorageChoice::Vault,
        ]))
    }
}
