//! System keyring access
//!
//! Secrets are addressed by `(service, account)`; `SSHDeck` uses a fixed
//! service name and the connection ID as the account.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{SecretError, SecretResult};

/// Default keyring service name
pub const DEFAULT_SERVICE: &str = "sshdeck";

/// External secret store keyed by service and account
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Looks up a secret; `Ok(None)` when there is no entry
    async fn get(&self, service: &str, account: &str) -> SecretResult<Option<SecretString>>;

    /// Stores or replaces a secret
    async fn set(&self, service: &str, account: &str, secret: &SecretString) -> SecretResult<()>;

    /// Deletes a secret; deleting a missing entry succeeds
    async fn delete(&self, service: &str, account: &str) -> SecretResult<()>;
}

/// Platform keyring (Secret Service, macOS Keychain, Windows Credential Manager)
///
/// The `keyring` crate is blocking, so every call runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    /// Creates a keyring store
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn entry(service: &str, account: &str) -> SecretResult<keyring::Entry> {
    keyring::Entry::new(service, account)
        .map_err(|e| SecretError::BackendUnavailable(e.to_string()))
}

async fn blocking<T, F>(f: F) -> SecretResult<T>
where
    F: FnOnce() -> SecretResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SecretError::BackendUnavailable(format!("keyring task failed: {e}")))?
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, service: &str, account: &str) -> SecretResult<Option<SecretString>> {
        let (service, account) = (service.to_string(), account.to_string());
        blocking(move || match entry(&service, &account)?.get_password() {
            Ok(secret) if secret.is_empty() => Ok(None),
            Ok(secret) => Ok(Some(SecretString::from(secret))),
            Err(keyring::Error::NoEntry) => {
                debug!(account = %account, "No keyring entry");
                Ok(None)
            }
            Err(keyring::Error::NoStorageAccess(e) | keyring::Error::PlatformFailure(e)) => {
                Err(SecretError::BackendUnavailable(e.to_string()))
            }
            Err(e) => Err(SecretError::RetrieveFailed(e.to_string())),
        })
        .await
    }

    async fn set(&self, service: &str, account: &str, secret: &SecretString) -> SecretResult<()> {
        let (service, account) = (service.to_string(), account.to_string());
        let secret = secret.clone();
        blocking(move || {
            entry(&service, &account)?
                .set_password(secret.expose_secret())
                .map_err(|e| SecretError::StoreFailed(e.to_string()))
        })
        .await
    }

    async fn delete(&self, service: &str, account: &str) -> SecretResult<()> {
        let (service, account) = (service.to_string(), account.to_string());
        blocking(move || match entry(&service, &account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretError::DeleteFailed(e.to_string())),
        })
        .await
    }
}
