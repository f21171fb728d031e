//! Connection record model

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

/// Port assumed by the SSH client when none is given
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How a connection authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Password authentication
    Password,
    /// Public key authentication (inline key, key file or client defaults)
    Key,
}

/// A saved SSH connection profile
///
/// The password and the inline private key are separate fields; only one
/// of them is meaningful for a given `use_password` value.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    /// Backend-assigned identifier, never reused after deletion
    pub id: String,
    /// Display name
    pub name: String,
    /// Remote host name or address
    pub host: String,
    /// Remote port; 0 and 22 both mean the default port
    pub port: u16,
    /// Remote user name
    pub username: String,
    /// Whether password authentication is used
    pub use_password: bool,
    /// Plaintext password (password authentication)
    pub password: Option<SecretString>,
    /// Inline private key material (key authentication)
    pub private_key: Option<SecretString>,
    /// Public key written next to a materialized private key
    pub public_key: Option<String>,
    /// Existing key file on disk
    pub key_file: Option<PathBuf>,
}

impl ConnectionRecord {
    /// Creates a key-authenticated record with a fresh ID
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            host: host.into(),
            port: 0,
            username: username.into(),
            use_password: false,
            password: None,
            private_key: None,
            public_key: None,
            key_file: None,
        }
    }

    /// Sets the port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Switches to password authentication with an inline password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.use_password = true;
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Switches to key authentication with inline key material
    #[must_use]
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.use_password = false;
        self.private_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets an existing key file
    #[must_use]
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Authentication kind derived from `use_password`
    #[must_use]
    pub const fn auth_kind(&self) -> AuthKind {
        if self.use_password {
            AuthKind::Password
        } else {
            AuthKind::Key
        }
    }

    /// Port to pass explicitly, or `None` when the default applies
    #[must_use]
    pub const fn explicit_port(&self) -> Option<u16> {
        match self.port {
            0 | DEFAULT_SSH_PORT => None,
            port => Some(port),
        }
    }

    /// Port the client will actually connect to
    #[must_use]
    pub const fn effective_port(&self) -> u16 {
        match self.explicit_port() {
            Some(port) => port,
            None => DEFAULT_SSH_PORT,
        }
    }

    /// `user@host`, or the bare host when no user is set
    #[must_use]
    pub fn destination(&self) -> String {
        if self.username.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.username, self.host)
        }
    }

    /// Window title: `user@host:port - name`
    #[must_use]
    pub fn window_title(&self) -> String {
        format!(
            "{}:{} - {}",
            self.destination(),
            self.effective_port(),
            self.name
        )
    }

    /// Whether a non-empty inline password is present
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password
            .as_ref()
            .is_some_and(|p| !p.expose_secret().is_empty())
    }

    /// Whether non-empty inline key material is present
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.private_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }
}
