//! Local connection file
//!
//! Records live in a TOML file as `[[connections]]` tables. Every write
//! rewrites the whole file through a temporary sibling and a rename, with
//! owner-only permissions. When a [`SecretStore`] is attached, passwords go
//! to the store under the record ID instead of the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{ConnectionRecord, VaultScope};
use crate::secret::SecretStore;

use super::ConnectionStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConnectionsFile {
    #[serde(default)]
    connections: Vec<StoredConnection>,
}

/// On-disk form of a record
#[derive(Debug, Serialize, Deserialize)]
struct StoredConnection {
    id: String,
    name: String,
    host: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    username: String,
    #[serde(default)]
    use_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_file: Option<PathBuf>,
}

fn non_empty(secret: Option<&SecretString>) -> Option<String> {
    secret
        .map(|s| s.expose_secret().to_string())
        .filter(|s| !s.is_empty())
}

impl StoredConnection {
    fn from_record(record: &ConnectionRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            host: record.host.clone(),
            port: record.port,
            username: record.username.clone(),
            use_password: record.use_password,
            password: if record.use_password {
                non_empty(record.password.as_ref())
            } else {
                None
            },
            private_key: if record.use_password {
                None
            } else {
                non_empty(record.private_key.as_ref())
            },
            public_key: record.public_key.clone().filter(|k| !k.is_empty()),
            key_file: record.key_file.clone(),
        }
    }

    fn into_record(self) -> ConnectionRecord {
        ConnectionRecord {
            id: self.id,
            name: self.name,
            host: self.host,
            port: self.port,
            username: self.username,
            use_password: self.use_password,
            password: self.password.map(SecretString::from),
            private_key: self.private_key.map(SecretString::from),
            public_key: self.public_key,
            key_file: self.key_file,
        }
    }
}

/// Connection store backed by a TOML file
pub struct LocalStore {
    path: PathBuf,
    secrets: Option<Arc<dyn SecretStore>>,
    service: String,
    // serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("path", &self.path)
            .field("secrets", &self.secrets.is_some())
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Creates a store for `path`; the file is created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            secrets: None,
            service: crate::secret::DEFAULT_SERVICE.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Stores passwords in `secrets` under `service` instead of the file
    #[must_use]
    pub fn with_secret_store(mut self, secrets: Arc<dyn SecretStore>, service: impl Into<String>) -> Self {
        self.secrets = Some(secrets);
        self.service = service.into();
        self
    }

    /// Connection file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> StorageResult<ConnectionsFile> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No connection file yet");
                return Ok(ConnectionsFile::default());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|e| {
            StorageError::Parse(format!("{}: {e}", self.path.display()))
        })
    }

    async fn write_file(&self, file: &ConnectionsFile) -> StorageResult<()> {
        let content = toml::to_string_pretty(file)
            .map_err(|e| StorageError::Parse(format!("Failed to serialize connections: {e}")))?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StorageError::Io { path, source }
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(parent))?;
        }

        let tmp = temp_path(&self.path);
        write_private(&tmp, content.as_bytes())
            .await
            .map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_err(&self.path))?;
        debug!(path = %self.path.display(), count = file.connections.len(), "Wrote connection file");
        Ok(())
    }

    /// Moves the password of `stored` to the secret store when one is attached
    async fn offload_password(&self, stored: &mut StoredConnection) {
        let Some(secrets) = self.secrets.as_ref() else {
            return;
        };
        if !stored.use_password {
            self.forget_password(&stored.id).await;
            return;
        }
        let Some(password) = stored.password.take() else {
            return;
        };
        let secret = SecretString::from(password.clone());
        if let Err(e) = secrets.set(&self.service, &stored.id, &secret).await {
            warn!(error = %e, "Keyring unavailable, keeping password in the connection file");
            stored.password = Some(password);
        }
    }

    async fn forget_password(&self, id: &str) {
        if let Some(secrets) = self.secrets.as_ref()
            && let Err(e) = secrets.delete(&self.service, id).await
        {
            warn!(error = %e, "Failed to clear keyring entry");
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `content` to a file that is owner-only from the moment it exists
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        // mode() only applies on creation
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(content).await?;
    file.sync_all().await
}

#[async_trait]
impl ConnectionStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn load(&self, _scope: Option<&VaultScope>) -> StorageResult<Vec<ConnectionRecord>> {
        let file = self.read_file().await?;
        let records: Vec<_> = file
            .connections
            .into_iter()
            .map(StoredConnection::into_record)
            .collect();
        info!(count = records.len(), "Loaded local connections");
        Ok(records)
    }

    async fn add(&self, record: &ConnectionRecord, _scope: Option<&VaultScope>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;

        let mut stored = StoredConnection::from_record(record);
        if stored.id.is_empty() || file.connections.iter().any(|c| c.id == stored.id) {
            stored.id = Uuid::new_v4().to_string();
        }
        self.offload_password(&mut stored).await;

        info!(id = %stored.id, "Adding local connection");
        file.connections.push(stored);
        self.write_file(&file).await
    }

    async fn edit(&self, record: &ConnectionRecord, _scope: Option<&VaultScope>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;

        let Some(slot) = file.connections.iter_mut().find(|c| c.id == record.id) else {
            return Err(StorageError::NotFound(record.id.clone()));
        };

        let mut stored = StoredConnection::from_record(record);
        let keeps_saved_password = stored.use_password && stored.password.is_none();
        if keeps_saved_password {
            // blank password on edit keeps whatever was saved before
            stored.password = slot.password.take();
        }
        if !keeps_saved_password || stored.password.is_some() {
            self.offload_password(&mut stored).await;
        }
        *slot = stored;

        info!(id = %record.id, "Updated local connection");
        self.write_file(&file).await
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file().await?;

        let before = file.connections.len();
        file.connections.retain(|c| c.id != id);
        if file.connections.len() == before {
            return Err(StorageError::NotFound(id.to_string()));
        }

        self.write_file(&file).await?;
        self.forget_password(id).await;
        info!(id, "Deleted local connection");
        Ok(())
    }
}
