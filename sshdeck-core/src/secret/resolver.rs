//! Credential resolution for a launch request
//!
//! Decides, per connection, which credential is usable and whether the
//! private key has to be written to disk first.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::LaunchResult;
use crate::logging::span_names;
use crate::models::ConnectionRecord;

use super::keychain::SecretStore;
use super::materialize::KeyMaterializer;

/// Credential ready to hand to the launcher
#[derive(Debug, Clone)]
pub enum ResolvedAuth {
    /// Password authentication with a known password
    Password(SecretString),
    /// Key authentication with an identity file
    KeyFile {
        /// Identity file path
        path: PathBuf,
        /// Whether the file was written for this launch
        materialized: bool,
    },
    /// Key authentication with the client's default identities
    ClientDefault,
}

impl ResolvedAuth {
    /// Identity file to pass with `-i`, if any
    #[must_use]
    pub fn key_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::KeyFile { path, .. } => Some(path),
            Self::Password(_) | Self::ClientDefault => None,
        }
    }

    /// Materialized key written for this launch, if any
    #[must_use]
    pub fn materialized_key(&self) -> Option<&std::path::Path> {
        match self {
            Self::KeyFile {
                path,
                materialized: true,
            } => Some(path),
            _ => None,
        }
    }
}

/// A connection together with its resolved credential
#[derive(Debug, Clone)]
pub struct ResolvedConnection {
    /// Connection with inline key material cleared
    pub record: ConnectionRecord,
    /// Credential to use
    pub auth: ResolvedAuth,
}

/// Outcome of resolving credentials for a launch
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Credentials are ready
    Ready(ResolvedConnection),
    /// A password has to be entered interactively
    PasswordRequired {
        /// Connection asking for the password
        record: ConnectionRecord,
        /// Why the password could not be found
        reason: String,
    },
}

/// Resolves launch credentials from the record and an optional secret store
#[derive(Clone)]
pub struct CredentialResolver {
    secret_store: Option<Arc<dyn SecretStore>>,
    service: String,
    materializer: KeyMaterializer,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("secret_store", &self.secret_store.is_some())
            .field("service", &self.service)
            .field("materializer", &self.materializer)
            .finish()
    }
}

impl CredentialResolver {
    /// Creates a resolver
    #[must_use]
    pub fn new(
        secret_store: Option<Arc<dyn SecretStore>>,
        service: impl Into<String>,
        materializer: KeyMaterializer,
    ) -> Self {
        Self {
            secret_store,
            service: service.into(),
            materializer,
        }
    }

    /// Key materializer used for inline keys
    #[must_use]
    pub const fn materializer(&self) -> &KeyMaterializer {
        &self.materializer
    }

    /// Resolves the credential for one launch
    ///
    /// Password connections use the inline password, then the secret store
    /// entry for the connection ID; neither ⇒ `PasswordRequired`. Key
    /// connections with inline material get a materialized key file and the
    /// material is cleared from the returned record.
    ///
    /// # Errors
    /// Returns `LaunchError::KeyMaterialization` if the key cannot be written.
    pub async fn resolve(&self, record: ConnectionRecord) -> LaunchResult<Resolution> {
        let span = info_span!(span_names::CREDENTIAL_RESOLVE, connection_id = %record.id);
        self.resolve_inner(record).instrument(span).await
    }

    async fn resolve_inner(&self, mut record: ConnectionRecord) -> LaunchResult<Resolution> {
        if record.use_password {
            if record.has_password()
                && let Some(password) = record.password.clone()
            {
                debug!("Using inline password");
                return Ok(Resolution::Ready(ResolvedConnection {
                    record,
                    auth: ResolvedAuth::Password(password),
                }));
            }
            return Ok(self.resolve_from_store(record).await);
        }

        if record.has_private_key()
            && let Some(key) = record.private_key.take()
        {
            let path =
                self.materializer
                    .materialize(&record.name, &key, record.public_key.as_deref())?;
            return Ok(Resolution::Ready(ResolvedConnection {
                record,
                auth: ResolvedAuth::KeyFile {
                    path,
                    materialized: true,
                },
            }));
        }
        record.private_key = None;

        let auth = match record.key_file.clone() {
            Some(path) if !path.as_os_str().is_empty() => ResolvedAuth::KeyFile {
                path,
                materialized: false,
            },
            _ => ResolvedAuth::ClientDefault,
        };
        Ok(Resolution::Ready(ResolvedConnection { record, auth }))
    }

    async fn resolve_from_store(&self, record: ConnectionRecord) -> Resolution {
        let Some(store) = self.secret_store.as_ref() else {
            return Resolution::PasswordRequired {
                record,
                reason: "No password saved".to_string(),
            };
        };

        match store.get(&self.service, &record.id).await {
            Ok(Some(password)) => {
                debug!("Using password from secret store");
                Resolution::Ready(ResolvedConnection {
                    record,
                    auth: ResolvedAuth::Password(password),
                })
            }
            Ok(None) => Resolution::PasswordRequired {
                record,
                reason: "No password saved".to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Secret store lookup failed");
                Resolution::PasswordRequired {
                    record,
                    reason: format!("Secret store lookup failed: {e}"),
                }
            }
        }
    }
}
