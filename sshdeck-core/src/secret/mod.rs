//! Credential handling for `SSHDeck`
//!
//! - [`SecretStore`] / [`KeyringStore`] - system keyring lookups by connection ID
//! - [`CredentialResolver`] - decides which credential a launch uses
//! - [`KeyMaterializer`] - writes inline private keys to owner-only files

mod keychain;
mod materialize;
mod resolver;

pub use keychain::{DEFAULT_SERVICE, KeyringStore, SecretStore};
pub use materialize::{KeyMaterializer, public_key_path, sanitize_key_name};
pub use resolver::{CredentialResolver, Resolution, ResolvedAuth, ResolvedConnection};
