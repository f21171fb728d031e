//! Core data structures

mod connection;
mod vault;

pub use connection::{AuthKind, ConnectionRecord, DEFAULT_SSH_PORT};
pub use vault::{Collection, Organization, VaultScope, VaultStatus};
