//! Vault hierarchy types

use serde::Deserialize;

/// Authentication state of the vault client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VaultStatus {
    /// An account is logged in
    pub logged_in: bool,
    /// The vault is unlocked for this process
    pub unlocked: bool,
}

impl VaultStatus {
    /// Status of a logged-in, unlocked vault
    pub const READY: Self = Self {
        logged_in: true,
        unlocked: true,
    };
}

/// An organization the account belongs to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    /// Organization ID
    pub id: String,
    /// Display name
    pub name: String,
}

/// A collection inside an organization
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    /// Collection ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Owning organization
    #[serde(rename = "organizationId")]
    pub organization_id: String,
}

/// The part of the vault a connection listing is scoped to
///
/// There is no unscoped listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultScope {
    /// The account's personal vault
    Personal,
    /// A collection within an organization
    Collection {
        /// Organization ID
        organization_id: String,
        /// Collection ID
        collection_id: String,
    },
}

impl VaultScope {
    /// Creates a collection scope
    #[must_use]
    pub fn collection(organization_id: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self::Collection {
            organization_id: organization_id.into(),
            collection_id: collection_id.into(),
        }
    }

    /// Whether this is the personal vault
    #[must_use]
    pub const fn is_personal(&self) -> bool {
        matches!(self, Self::Personal)
    }
}

impl std::fmt::Display for VaultScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Personal => f.write_str("personal"),
            Self::Collection {
                organization_id,
                collection_id,
            } => write!(f, "{organization_id}/{collection_id}"),
        }
    }
}
