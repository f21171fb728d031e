//! Private key materialization
//!
//! Inline key material is written to `<dir>/id_<sanitized name>` so the SSH
//! client can reference it with `-i`. The path depends only on the
//! connection name, so repeated launches overwrite the same file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::{LaunchError, LaunchResult};

/// Key file prefix
const KEY_PREFIX: &str = "id_";

/// Replaces every byte that is not ASCII alphanumeric with `_`
#[must_use]
pub fn sanitize_key_name(name: &str) -> String {
    name.bytes()
        .map(|b| if b.is_ascii_alphanumeric() { b as char } else { '_' })
        .collect()
}

/// Writes private keys into a per-user directory with owner-only access
#[derive(Debug, Clone)]
pub struct KeyMaterializer {
    dir: PathBuf,
}

impl KeyMaterializer {
    /// Creates a materializer writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the key for `name` is written to
    #[must_use]
    pub fn key_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{KEY_PREFIX}{}", sanitize_key_name(name)))
    }

    /// Writes the key (and optional public key) and returns the key path
    ///
    /// Existing files are truncated and their permissions reset. A trailing
    /// newline is added when missing; OpenSSH rejects keys without one.
    ///
    /// # Errors
    /// Returns `LaunchError::KeyMaterialization` if the directory or a file
    /// cannot be written.
    pub fn materialize(
        &self,
        name: &str,
        private_key: &SecretString,
        public_key: Option<&str>,
    ) -> LaunchResult<PathBuf> {
        let path = self.key_path(name);
        let fail = |path: &Path| {
            let path = path.to_path_buf();
            move |source| LaunchError::KeyMaterialization { path, source }
        };

        create_private_dir(&self.dir).map_err(fail(&self.dir))?;

        let mut material = private_key.expose_secret().to_string();
        if !material.ends_with('\n') {
            material.push('\n');
        }
        write_with_mode(&path, material.as_bytes(), 0o600).map_err(fail(&path))?;

        let pub_path = public_key_path(&path);
        if let Some(public_key) = public_key.filter(|k| !k.trim().is_empty()) {
            let mut content = public_key.trim_end().to_string();
            content.push('\n');
            write_with_mode(&pub_path, content.as_bytes(), 0o644).map_err(fail(&pub_path))?;
        } else {
            // a public key left by an earlier launch no longer matches
            match fs::remove_file(&pub_path) {
                Ok(()) => debug!(path = %pub_path.display(), "Removed stale public key"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(fail(&pub_path)(e)),
            }
        }

        debug!(path = %path.display(), "Materialized key file");
        Ok(path)
    }

    /// Removes a key previously written by this materializer
    ///
    /// Paths outside the key directory are ignored.
    pub fn remove(&self, path: &Path) {
        if path.parent() != Some(self.dir.as_path()) {
            warn!(path = %path.display(), "Refusing to remove key outside key directory");
            return;
        }
        for target in [path.to_path_buf(), public_key_path(path)] {
            match fs::remove_file(&target) {
                Ok(()) => debug!(path = %target.display(), "Removed materialized key"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %target.display(), error = %e, "Failed to remove key"),
            }
        }
    }
}

/// `<key>.pub`
#[must_use]
pub fn public_key_path(key_path: &Path) -> PathBuf {
    let mut name = key_path.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_with_mode(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_with_mode(path: &Path, content: &[u8], _mode: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}
