//! Connection storage backends
//!
//! Two backends share one capability set ([`ConnectionStore`]): a local
//! TOML file and a Bitwarden vault, which additionally implements
//! [`VaultService`] for its login/unlock protocol and the
//! organization → collection hierarchy.
//!
//! IO never happens on the controller's thread. The controller turns an
//! intent into a [`StorageOp`], a worker runs it against a
//! [`BackendHandle`], and the resulting [`StorageReply`] is applied to the
//! [`StorageBackend`] snapshot back on the controller's thread.

mod backend;
pub mod bitwarden;
pub mod local;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{Instrument, info_span};

use crate::config::VaultSettings;
use crate::error::{StorageError, StorageResult};
use crate::logging::span_names;
use crate::models::{Collection, ConnectionRecord, Organization, VaultScope, VaultStatus};
use crate::secret::SecretStore;

pub use backend::{BackendKind, LocalBackend, StorageBackend, VaultBackend};
pub use bitwarden::{BitwardenVault, BwCli, BwRunner};
pub use local::LocalStore;

/// CRUD over connection records
///
/// `scope` is `None` for backends without a hierarchy. Vault backends
/// reject `None` for listing; for writes `Some(VaultScope::Collection)`
/// files the record under that organization and collection.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Short backend name for logs and errors
    fn backend_name(&self) -> &'static str;

    /// Loads every record visible in `scope`
    async fn load(&self, scope: Option<&VaultScope>) -> StorageResult<Vec<ConnectionRecord>>;

    /// Adds a record
    async fn add(&self, record: &ConnectionRecord, scope: Option<&VaultScope>)
    -> StorageResult<()>;

    /// Replaces the record with the same ID
    async fn edit(
        &self,
        record: &ConnectionRecord,
        scope: Option<&VaultScope>,
    ) -> StorageResult<()>;

    /// Deletes the record with `id`
    async fn delete(&self, id: &str) -> StorageResult<()>;
}

/// Vault-only operations
#[async_trait]
pub trait VaultService: ConnectionStore {
    /// Current authentication status
    async fn status(&self) -> StorageResult<VaultStatus>;

    /// Logs in with the account secret and an optional one-time code
    async fn login(
        &self,
        email: &str,
        password: &SecretString,
        otp: Option<&str>,
    ) -> StorageResult<()>;

    /// Unlocks an already logged-in vault
    async fn unlock(&self, password: &SecretString) -> StorageResult<()>;

    /// Organizations the account belongs to
    async fn list_organizations(&self) -> StorageResult<Vec<Organization>>;

    /// Collections inside one organization
    async fn list_collections(&self, organization_id: &str) -> StorageResult<Vec<Collection>>;
}

/// Opens backends when the user selects them
pub trait BackendFactory: Send + Sync {
    /// Local connection store
    fn local(&self) -> Arc<dyn ConnectionStore>;

    /// Vault client configured by `settings`
    fn vault(&self, settings: &VaultSettings) -> Arc<dyn VaultService>;
}

/// [`BackendFactory`] for the connection file and the `bw` CLI
pub struct SystemBackends {
    connections_path: PathBuf,
    secrets: Option<(Arc<dyn SecretStore>, String)>,
}

impl std::fmt::Debug for SystemBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemBackends")
            .field("connections_path", &self.connections_path)
            .field("secrets", &self.secrets.as_ref().map(|(_, service)| service))
            .finish()
    }
}

impl SystemBackends {
    /// Creates a factory for the connection file at `connections_path`
    #[must_use]
    pub fn new(connections_path: impl Into<PathBuf>) -> Self {
        Self {
            connections_path: connections_path.into(),
            secrets: None,
        }
    }

    /// Keeps local passwords in `secrets` under `service`
    #[must_use]
    pub fn with_secret_store(mut self, secrets: Arc<dyn SecretStore>, service: impl Into<String>) -> Self {
        self.secrets = Some((secrets, service.into()));
        self
    }
}

impl BackendFactory for SystemBackends {
    fn local(&self) -> Arc<dyn ConnectionStore> {
        let store = LocalStore::new(&self.connections_path);
        match &self.secrets {
            Some((secrets, service)) => {
                Arc::new(store.with_secret_store(Arc::clone(secrets), service.clone()))
            }
            None => Arc::new(store),
        }
    }

    fn vault(&self, settings: &VaultSettings) -> Arc<dyn VaultService> {
        Arc::new(
            BitwardenVault::from_cli(settings.binary.clone())
                .with_server_url(settings.server_url.clone()),
        )
    }
}

/// Shareable reference to the IO side of a backend
#[derive(Clone)]
pub enum BackendHandle {
    /// Local store
    Local(Arc<dyn ConnectionStore>),
    /// Vault client
    Vault(Arc<dyn VaultService>),
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(store) => write!(f, "BackendHandle::Local({})", store.backend_name()),
            Self::Vault(store) => write!(f, "BackendHandle::Vault({})", store.backend_name()),
        }
    }
}

/// A storage request to run off the controller's thread
#[derive(Debug, Clone)]
pub enum StorageOp {
    /// Load connections (scoped for vaults)
    Load {
        /// Listing scope
        scope: Option<VaultScope>,
    },
    /// Add a connection
    Add {
        /// New record
        record: ConnectionRecord,
        /// Target scope
        scope: Option<VaultScope>,
    },
    /// Replace a connection
    Edit {
        /// Updated record
        record: ConnectionRecord,
        /// Target scope
        scope: Option<VaultScope>,
    },
    /// Delete a connection
    Delete {
        /// Record ID
        id: String,
    },
    /// Query vault status
    Status,
    /// Log in to the vault
    Login {
        /// Account email
        email: String,
        /// Master password
        password: SecretString,
        /// One-time code
        otp: Option<String>,
    },
    /// Unlock the vault
    Unlock {
        /// Master password
        password: SecretString,
    },
    /// List organizations
    ListOrganizations,
    /// List collections of an organization
    LoadCollections {
        /// Organization ID
        organization_id: String,
    },
}

impl StorageOp {
    /// Operation name for logs and loading indicators
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::Status => "status",
            Self::Login { .. } => "login",
            Self::Unlock { .. } => "unlock",
            Self::ListOrganizations => "list_organizations",
            Self::LoadCollections { .. } => "load_collections",
        }
    }
}

/// Result of a [`StorageOp`]
#[derive(Debug)]
pub enum StorageReply {
    /// Result of `Load`
    Connections {
        /// Scope that was requested
        scope: Option<VaultScope>,
        /// Loaded records
        result: StorageResult<Vec<ConnectionRecord>>,
    },
    /// Result of `Add`, `Edit` or `Delete`
    Persisted(StorageResult<()>),
    /// Result of `Status`
    Status(StorageResult<VaultStatus>),
    /// Result of `Login` or `Unlock`
    Authenticated(StorageResult<()>),
    /// Result of `ListOrganizations`
    Organizations(StorageResult<Vec<Organization>>),
    /// Result of `LoadCollections`
    Collections {
        /// Organization that was requested
        organization_id: String,
        /// Loaded collections
        result: StorageResult<Vec<Collection>>,
    },
}

impl BackendHandle {
    fn store(&self) -> &dyn ConnectionStore {
        match self {
            Self::Local(store) => store.as_ref(),
            Self::Vault(vault) => vault.as_ref(),
        }
    }

    fn vault(&self, operation: &'static str) -> StorageResult<&dyn VaultService> {
        match self {
            Self::Vault(vault) => Ok(vault.as_ref()),
            Self::Local(store) => Err(StorageError::Unsupported {
                backend: store.backend_name(),
                operation,
            }),
        }
    }

    /// Runs one operation and packages its result
    pub async fn execute(&self, op: StorageOp) -> StorageReply {
        let span = match op {
            StorageOp::Load { .. } | StorageOp::ListOrganizations | StorageOp::LoadCollections { .. } => {
                info_span!(span_names::STORAGE_LOAD, op = op.name(), backend = self.store().backend_name())
            }
            StorageOp::Add { .. } | StorageOp::Edit { .. } | StorageOp::Delete { .. } => {
                info_span!(span_names::STORAGE_WRITE, op = op.name(), backend = self.store().backend_name())
            }
            StorageOp::Status | StorageOp::Login { .. } | StorageOp::Unlock { .. } => {
                info_span!(span_names::VAULT_AUTH, op = op.name(), backend = self.store().backend_name())
            }
        };
        self.execute_inner(op).instrument(span).await
    }

    async fn execute_inner(&self, op: StorageOp) -> StorageReply {
        match op {
            StorageOp::Load { scope } => {
                let result = self.store().load(scope.as_ref()).await;
                StorageReply::Connections { scope, result }
            }
            StorageOp::Add { record, scope } => {
                StorageReply::Persisted(self.store().add(&record, scope.as_ref()).await)
            }
            StorageOp::Edit { record, scope } => {
                StorageReply::Persisted(self.store().edit(&record, scope.as_ref()).await)
            }
            StorageOp::Delete { id } => StorageReply::Persisted(self.store().delete(&id).await),
            StorageOp::Status => StorageReply::Status(match self.vault("status") {
                Ok(vault) => vault.status().await,
                Err(e) => Err(e),
            }),
            StorageOp::Login {
                email,
                password,
                otp,
            } => StorageReply::Authenticated(match self.vault("login") {
                Ok(vault) => vault.login(&email, &password, otp.as_deref()).await,
                Err(e) => Err(e),
            }),
            StorageOp::Unlock { password } => {
                StorageReply::Authenticated(match self.vault("unlock") {
                    Ok(vault) => vault.unlock(&password).await,
                    Err(e) => Err(e),
                })
            }
            StorageOp::ListOrganizations => {
                StorageReply::Organizations(match self.vault("list_organizations") {
                    Ok(vault) => vault.list_organizations().await,
                    Err(e) => Err(e),
                })
            }
            StorageOp::LoadCollections { organization_id } => {
                let result = match self.vault("load_collections") {
                    Ok(vault) => vault.list_collections(&organization_id).await,
                    Err(e) => Err(e),
                };
                StorageReply::Collections {
                    organization_id,
                    result,
                }
            }
        }
    }
}
