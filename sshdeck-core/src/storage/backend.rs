//! Stateful view of the active backend
//!
//! The snapshots live here and are only mutated on the controller's
//! thread by applying [`StorageReply`](super::StorageReply) results.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::models::{Collection, ConnectionRecord, Organization, VaultScope, VaultStatus};

use super::{BackendHandle, ConnectionStore, StorageOp, VaultService};

/// Which backend variant is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local connection file
    Local,
    /// Remote vault
    Vault,
}

/// Local backend state
pub struct LocalBackend {
    store: Arc<dyn ConnectionStore>,
    snapshot: Vec<ConnectionRecord>,
}

/// Vault backend state
pub struct VaultBackend {
    client: Arc<dyn VaultService>,
    status: VaultStatus,
    organizations: Vec<Organization>,
    collections: Vec<Collection>,
    collections_org: Option<String>,
    scope: Option<VaultScope>,
    snapshot: Vec<ConnectionRecord>,
}

impl VaultBackend {
    /// Last known authentication status
    #[must_use]
    pub const fn status(&self) -> VaultStatus {
        self.status
    }

    /// Organizations from the last successful listing
    #[must_use]
    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    /// Collections of [`Self::collections_org`]
    #[must_use]
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Organization the collection set belongs to
    #[must_use]
    pub fn collections_org(&self) -> Option<&str> {
        self.collections_org.as_deref()
    }

    /// Scope of the current connection snapshot
    #[must_use]
    pub const fn scope(&self) -> Option<&VaultScope> {
        self.scope.as_ref()
    }

    /// Records the result of a status query
    ///
    /// # Errors
    /// Returns the query error unchanged; the previous status is kept.
    pub fn apply_status(&mut self, result: StorageResult<VaultStatus>) -> StorageResult<VaultStatus> {
        let status = result?;
        self.status = status;
        Ok(status)
    }

    /// Marks the vault as ready after a successful login or unlock
    pub fn mark_ready(&mut self) {
        self.status = VaultStatus::READY;
    }

    /// Replaces the organization set
    ///
    /// # Errors
    /// Returns the listing error unchanged; the previous set is kept.
    pub fn apply_organizations(
        &mut self,
        result: StorageResult<Vec<Organization>>,
    ) -> StorageResult<()> {
        self.organizations = result?;
        Ok(())
    }

    /// Replaces the collection set with the collections of `organization_id`
    ///
    /// # Errors
    /// Returns the listing error unchanged; the previous set is kept.
    pub fn apply_collections(
        &mut self,
        organization_id: String,
        result: StorageResult<Vec<Collection>>,
    ) -> StorageResult<()> {
        self.collections = result?;
        self.collections_org = Some(organization_id);
        Ok(())
    }
}

/// The active storage backend with its in-memory state
pub enum StorageBackend {
    /// Local connection file
    Local(LocalBackend),
    /// Remote vault
    Vault(VaultBackend),
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(local) => f
                .debug_struct("Local")
                .field("records", &local.snapshot.len())
                .finish(),
            Self::Vault(vault) => f
                .debug_struct("Vault")
                .field("status", &vault.status)
                .field("scope", &vault.scope)
                .field("records", &vault.snapshot.len())
                .finish(),
        }
    }
}

impl StorageBackend {
    /// Wraps a local store with an empty snapshot
    #[must_use]
    pub fn local(store: Arc<dyn ConnectionStore>) -> Self {
        Self::Local(LocalBackend {
            store,
            snapshot: Vec::new(),
        })
    }

    /// Wraps a vault client with unknown status and no hierarchy loaded
    #[must_use]
    pub fn vault(client: Arc<dyn VaultService>) -> Self {
        Self::Vault(VaultBackend {
            client,
            status: VaultStatus::default(),
            organizations: Vec::new(),
            collections: Vec::new(),
            collections_org: None,
            scope: None,
            snapshot: Vec::new(),
        })
    }

    /// Variant tag
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Local(_) => BackendKind::Local,
            Self::Vault(_) => BackendKind::Vault,
        }
    }

    /// Handle for running operations off the controller's thread
    #[must_use]
    pub fn handle(&self) -> BackendHandle {
        match self {
            Self::Local(local) => BackendHandle::Local(Arc::clone(&local.store)),
            Self::Vault(vault) => BackendHandle::Vault(Arc::clone(&vault.client)),
        }
    }

    /// Records from the last successful load
    #[must_use]
    pub fn list(&self) -> &[ConnectionRecord] {
        match self {
            Self::Local(local) => &local.snapshot,
            Self::Vault(vault) => &vault.snapshot,
        }
    }

    /// Finds a record in the snapshot
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConnectionRecord> {
        self.list().iter().find(|r| r.id == id)
    }

    /// Vault state, when the vault is active
    #[must_use]
    pub const fn as_vault(&self) -> Option<&VaultBackend> {
        match self {
            Self::Vault(vault) => Some(vault),
            Self::Local(_) => None,
        }
    }

    /// Mutable vault state, when the vault is active
    pub fn as_vault_mut(&mut self) -> Option<&mut VaultBackend> {
        match self {
            Self::Vault(vault) => Some(vault),
            Self::Local(_) => None,
        }
    }

    /// Active listing scope; always `None` for the local backend
    #[must_use]
    pub fn scope(&self) -> Option<&VaultScope> {
        match self {
            Self::Local(_) => None,
            Self::Vault(vault) => vault.scope.as_ref(),
        }
    }

    /// Operation reloading the current snapshot
    #[must_use]
    pub fn reload_op(&self) -> StorageOp {
        StorageOp::Load {
            scope: self.scope().cloned(),
        }
    }

    /// Operation loading `scope`
    #[must_use]
    pub fn load_op(&self, scope: Option<VaultScope>) -> StorageOp {
        match self {
            Self::Local(_) => StorageOp::Load { scope: None },
            Self::Vault(_) => StorageOp::Load { scope },
        }
    }

    /// Operation adding `record` to the current scope
    #[must_use]
    pub fn add_op(&self, record: ConnectionRecord) -> StorageOp {
        StorageOp::Add {
            record,
            scope: self.scope().cloned(),
        }
    }

    /// Operation replacing `record` in the current scope
    #[must_use]
    pub fn edit_op(&self, record: ConnectionRecord) -> StorageOp {
        StorageOp::Edit {
            record,
            scope: self.scope().cloned(),
        }
    }

    /// Operation deleting the record with `id`
    #[must_use]
    pub fn delete_op(&self, id: impl Into<String>) -> StorageOp {
        StorageOp::Delete { id: id.into() }
    }

    /// Applies a load result
    ///
    /// On success the snapshot is replaced as a whole and, for the vault,
    /// `scope` becomes the active scope. On failure nothing changes.
    ///
    /// # Errors
    /// Returns the load error unchanged.
    pub fn apply_connections(
        &mut self,
        scope: Option<VaultScope>,
        result: StorageResult<Vec<ConnectionRecord>>,
    ) -> StorageResult<usize> {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Load failed, keeping previous snapshot");
                return Err(e);
            }
        };
        let count = records.len();
        match self {
            Self::Local(local) => local.snapshot = records,
            Self::Vault(vault) => {
                vault.snapshot = records;
                vault.scope = scope;
            }
        }
        debug!(count, "Replaced connection snapshot");
        Ok(count)
    }
}
