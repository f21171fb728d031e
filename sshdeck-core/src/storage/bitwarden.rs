//! Bitwarden vault backend
//!
//! Drives the Bitwarden CLI (`bw`). Connections are login items carrying
//! custom fields for the SSH details; items without a `host` field belong
//! to something else and are skipped.
//!
//! # Session Management
//!
//! `bw login --raw` and `bw unlock --raw` print a session key. It is kept
//! in memory for the lifetime of the process and handed to every later
//! command through `BW_SESSION`. A `BW_SESSION` already present in the
//! environment is picked up at construction.

use std::process::Stdio;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::error::{StorageError, StorageResult};
use crate::models::{Collection, ConnectionRecord, Organization, VaultScope, VaultStatus};

use super::{ConnectionStore, VaultService};

/// Environment variable carrying the session key
pub const SESSION_ENV: &str = "BW_SESSION";
/// Environment variable carrying the master password for `--passwordenv`
pub const PASSWORD_ENV: &str = "BW_PASSWORD";

/// Bitwarden item type for logins
const LOGIN_ITEM: u8 = 1;
/// Custom field types
const FIELD_TEXT: u8 = 0;
const FIELD_HIDDEN: u8 = 1;

const FIELD_HOST: &str = "host";
const FIELD_PORT: &str = "port";
const FIELD_USE_PASSWORD: &str = "use_password";
const FIELD_KEY_FILE: &str = "key_file";
const FIELD_PUBLIC_KEY: &str = "public_key";
const FIELD_PRIVATE_KEY: &str = "private_key";

const MANAGED_FIELDS: [&str; 6] = [
    FIELD_HOST,
    FIELD_PORT,
    FIELD_USE_PASSWORD,
    FIELD_KEY_FILE,
    FIELD_PUBLIC_KEY,
    FIELD_PRIVATE_KEY,
];

/// Runs `bw` with arguments and extra environment, returning trimmed stdout
#[async_trait]
pub trait BwRunner: Send + Sync {
    /// Executes one command
    async fn run(&self, args: &[String], env: &[(&'static str, SecretString)])
    -> StorageResult<String>;
}

/// [`BwRunner`] spawning the real CLI
#[derive(Debug, Clone)]
pub struct BwCli {
    binary: String,
}

impl BwCli {
    /// Creates a runner for `binary` (usually `bw`)
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for BwCli {
    fn default() -> Self {
        Self::new("bw")
    }
}

#[async_trait]
impl BwRunner for BwCli {
    async fn run(
        &self,
        args: &[String],
        env: &[(&'static str, SecretString)],
    ) -> StorageResult<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .arg("--nointeraction")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            cmd.env(key, value.expose_secret());
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::Unavailable(format!("{} not found in PATH", self.binary))
            } else {
                StorageError::Unavailable(format!("Failed to run {}: {e}", self.binary))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_failure(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn classify_failure(stderr: String) -> StorageError {
    let lower = stderr.to_lowercase();
    if lower.contains("vault is locked") || lower.contains("not logged in") {
        StorageError::Locked
    } else {
        StorageError::CommandFailed(stderr)
    }
}

#[derive(Debug, Deserialize)]
struct BwStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct BwItem {
    id: String,
    name: String,
    #[serde(default, rename = "organizationId")]
    organization_id: Option<String>,
    #[serde(default)]
    login: Option<BwLogin>,
    #[serde(default)]
    fields: Option<Vec<BwField>>,
}

#[derive(Debug, Deserialize)]
struct BwLogin {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BwField {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl BwItem {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .as_deref()?
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
            .and_then(|f| f.value.as_deref())
            .filter(|v| !v.is_empty())
    }

    fn into_record(self) -> Option<ConnectionRecord> {
        let host = self.field(FIELD_HOST)?.to_string();
        let port = self
            .field(FIELD_PORT)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0);
        let use_password = self
            .field(FIELD_USE_PASSWORD)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let key_file = self.field(FIELD_KEY_FILE).map(Into::into);
        let public_key = self.field(FIELD_PUBLIC_KEY).map(String::from);
        let private_key = self
            .field(FIELD_PRIVATE_KEY)
            .map(|k| SecretString::from(k.to_string()));
        let (username, password) = match self.login {
            Some(login) => (login.username.unwrap_or_default(), login.password),
            None => (String::new(), None),
        };

        Some(ConnectionRecord {
            id: self.id,
            name: self.name,
            host,
            port,
            username,
            use_password,
            password: password.filter(|p| !p.is_empty()).map(SecretString::from),
            private_key,
            public_key,
            key_file,
        })
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(output: &str, what: &str) -> StorageResult<T> {
    serde_json::from_str(output)
        .map_err(|e| StorageError::Parse(format!("Failed to parse {what}: {e}")))
}

fn text_field(name: &str, value: impl Into<String>) -> Value {
    json!({ "name": name, "value": value.into(), "type": FIELD_TEXT })
}

/// Custom fields describing `record`
fn record_fields(record: &ConnectionRecord) -> Vec<Value> {
    let mut fields = vec![
        text_field(FIELD_HOST, record.host.clone()),
        text_field(FIELD_PORT, record.port.to_string()),
        text_field(FIELD_USE_PASSWORD, record.use_password.to_string()),
    ];
    if let Some(key_file) = record.key_file.as_ref() {
        fields.push(text_field(FIELD_KEY_FILE, key_file.display().to_string()));
    }
    if let Some(public_key) = record.public_key.as_ref().filter(|k| !k.is_empty()) {
        fields.push(text_field(FIELD_PUBLIC_KEY, public_key.clone()));
    }
    if !record.use_password
        && let Some(key) = record.private_key.as_ref()
        && !key.expose_secret().is_empty()
    {
        fields.push(json!({
            "name": FIELD_PRIVATE_KEY,
            "value": key.expose_secret(),
            "type": FIELD_HIDDEN,
        }));
    }
    fields
}

fn login_value(record: &ConnectionRecord) -> Value {
    let password = if record.use_password {
        record
            .password
            .as_ref()
            .map(|p| Value::String(p.expose_secret().to_string()))
            .unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    json!({
        "username": record.username,
        "password": password,
        "uris": [{ "uri": format!("ssh://{}:{}", record.host, record.effective_port()), "match": null }],
    })
}

/// Full item template for a new record
fn new_item(record: &ConnectionRecord, scope: Option<&VaultScope>) -> Value {
    let (organization_id, collection_ids) = match scope {
        Some(VaultScope::Collection {
            organization_id,
            collection_id,
        }) => (json!(organization_id), json!([collection_id])),
        Some(VaultScope::Personal) | None => (Value::Null, json!([])),
    };
    json!({
        "type": LOGIN_ITEM,
        "name": record.name,
        "notes": null,
        "folderId": null,
        "organizationId": organization_id,
        "collectionIds": collection_ids,
        "fields": record_fields(record),
        "login": login_value(record),
    })
}

/// Updates `item` in place, keeping fields and data this backend does not manage
fn merge_item(item: &mut Value, record: &ConnectionRecord) {
    let Some(object) = item.as_object_mut() else {
        return;
    };
    object.insert("name".into(), json!(record.name));

    let mut fields: Vec<Value> = object
        .get("fields")
        .and_then(Value::as_array)
        .map(|existing| {
            existing
                .iter()
                .filter(|f| {
                    f.get("name")
                        .and_then(Value::as_str)
                        .is_none_or(|n| !MANAGED_FIELDS.contains(&n))
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    fields.extend(record_fields(record));
    object.insert("fields".into(), Value::Array(fields));

    let keep_password = record.use_password && !record.has_password();
    let mut login = login_value(record);
    if keep_password
        && let Some(old) = object.get("login").and_then(|l| l.get("password"))
        && let Some(login) = login.as_object_mut()
    {
        login.insert("password".into(), old.clone());
    }
    object.insert("login".into(), login);
}

fn encode(value: &Value) -> String {
    BASE64.encode(value.to_string())
}

/// Vault backed by the Bitwarden CLI
pub struct BitwardenVault {
    runner: Arc<dyn BwRunner>,
    server_url: Option<String>,
    session: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for BitwardenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitwardenVault")
            .field("server_url", &self.server_url)
            .field("has_session", &self.session_key().is_some())
            .finish_non_exhaustive()
    }
}

impl BitwardenVault {
    /// Creates a vault client over `runner`
    #[must_use]
    pub fn new(runner: Arc<dyn BwRunner>) -> Self {
        Self {
            runner,
            server_url: None,
            session: RwLock::new(None),
        }
    }

    /// Creates a client for the real CLI, reusing `BW_SESSION` when set
    #[must_use]
    pub fn from_cli(binary: impl Into<String>) -> Self {
        let vault = Self::new(Arc::new(BwCli::new(binary)));
        if let Ok(session) = std::env::var(SESSION_ENV)
            && !session.is_empty()
        {
            debug!("Using BW_SESSION from the environment");
            vault.set_session(SecretString::from(session));
        }
        vault
    }

    /// Self-hosted server URL applied before login
    #[must_use]
    pub fn with_server_url(mut self, url: Option<String>) -> Self {
        self.server_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Sets the session key
    pub fn set_session(&self, key: SecretString) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// Clears the session key
    pub fn clear_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn session_key(&self) -> Option<SecretString> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run(&self, args: &[&str]) -> StorageResult<String> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let env: Vec<_> = self
            .session_key()
            .map(|key| (SESSION_ENV, key))
            .into_iter()
            .collect();
        self.runner.run(&args, &env).await
    }

    async fn run_with_password(
        &self,
        args: &[&str],
        password: &SecretString,
    ) -> StorageResult<String> {
        let args: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        let mut env = vec![(PASSWORD_ENV, password.clone())];
        if let Some(key) = self.session_key() {
            env.push((SESSION_ENV, key));
        }
        self.runner.run(&args, &env).await
    }

    async fn sync(&self) {
        if let Err(e) = self.run(&["sync"]).await {
            warn!(error = %e, "bw sync failed, using cached vault data");
        }
    }

    fn accept_session(&self, output: &str) -> StorageResult<()> {
        let key = output.lines().last().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(StorageError::AuthFailed(
                "bw did not return a session key".to_string(),
            ));
        }
        self.set_session(SecretString::from(key.to_string()));
        Ok(())
    }

    async fn list_items(&self, scope: &VaultScope) -> StorageResult<Vec<BwItem>> {
        let output = match scope {
            VaultScope::Personal => {
                self.run(&["list", "items", "--organizationid", "null"])
                    .await?
            }
            VaultScope::Collection { collection_id, .. } => {
                self.run(&["list", "items", "--collectionid", collection_id])
                    .await?
            }
        };
        let items: Vec<BwItem> = parse_json(&output, "items")?;
        Ok(match scope {
            VaultScope::Personal => items
                .into_iter()
                .filter(|i| i.organization_id.is_none())
                .collect(),
            VaultScope::Collection {
                organization_id, ..
            } => items
                .into_iter()
                .filter(|i| i.organization_id.as_deref() == Some(organization_id.as_str()))
                .collect(),
        })
    }
}

#[async_trait]
impl ConnectionStore for BitwardenVault {
    fn backend_name(&self) -> &'static str {
        "bitwarden"
    }

    #[instrument(skip(self))]
    async fn load(&self, scope: Option<&VaultScope>) -> StorageResult<Vec<ConnectionRecord>> {
        let Some(scope) = scope else {
            return Err(StorageError::Unsupported {
                backend: self.backend_name(),
                operation: "unscoped listing",
            });
        };
        let records: Vec<_> = self
            .list_items(scope)
            .await?
            .into_iter()
            .filter_map(BwItem::into_record)
            .collect();
        info!(count = records.len(), scope = %scope, "Loaded vault connections");
        Ok(records)
    }

    #[instrument(skip(self, record))]
    async fn add(&self, record: &ConnectionRecord, scope: Option<&VaultScope>) -> StorageResult<()> {
        let item = new_item(record, scope);
        self.run(&["create", "item", &encode(&item)]).await?;
        info!("Created vault item");
        Ok(())
    }

    #[instrument(skip(self, record, _scope), fields(id = %record.id))]
    async fn edit(&self, record: &ConnectionRecord, _scope: Option<&VaultScope>) -> StorageResult<()> {
        let output = self.run(&["get", "item", &record.id]).await?;
        let mut item: Value = parse_json(&output, "item")?;
        merge_item(&mut item, record);
        let encoded = encode(&item);

        match self.run(&["edit", "item", &record.id, &encoded]).await {
            Err(StorageError::CommandFailed(msg))
                if msg.contains("out of date") || msg.contains("out-of-date") =>
            {
                info!("Vault item out of date, syncing and retrying");
                self.sync().await;
                self.run(&["edit", "item", &record.id, &encoded]).await?;
            }
            other => {
                other?;
            }
        }
        info!("Updated vault item");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.run(&["delete", "item", id]).await?;
        info!("Deleted vault item");
        Ok(())
    }
}

#[async_trait]
impl VaultService for BitwardenVault {
    async fn status(&self) -> StorageResult<VaultStatus> {
        let output = self.run(&["status"]).await?;
        let status: BwStatus = parse_json(&output, "status")?;
        let status = match status.status.as_str() {
            "unlocked" => VaultStatus::READY,
            "locked" => VaultStatus {
                logged_in: true,
                unlocked: false,
            },
            _ => VaultStatus::default(),
        };
        debug!(?status, "Vault status");
        Ok(status)
    }

    #[instrument(skip(self, email, password, otp), fields(otp = otp.is_some()))]
    async fn login(
        &self,
        email: &str,
        password: &SecretString,
        otp: Option<&str>,
    ) -> StorageResult<()> {
        if let Some(url) = self.server_url.as_deref()
            && let Err(e) = self.run(&["config", "server", url]).await
        {
            warn!(error = %e, "Failed to configure vault server");
        }

        let mut args = vec!["login", email, "--passwordenv", PASSWORD_ENV];
        let otp = otp.map(str::trim).filter(|c| !c.is_empty());
        if let Some(code) = otp {
            args.extend(["--method", "0", "--code", code]);
        }
        args.push("--raw");

        let output = self
            .run_with_password(&args, password)
            .await
            .map_err(into_auth_error)?;
        self.accept_session(&output)?;
        info!("Logged in to vault");
        self.sync().await;
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn unlock(&self, password: &SecretString) -> StorageResult<()> {
        let output = self
            .run_with_password(&["unlock", "--passwordenv", PASSWORD_ENV, "--raw"], password)
            .await
            .map_err(into_auth_error)?;
        self.accept_session(&output)?;
        info!("Unlocked vault");
        self.sync().await;
        Ok(())
    }

    async fn list_organizations(&self) -> StorageResult<Vec<Organization>> {
        let output = self.run(&["list", "organizations"]).await?;
        parse_json(&output, "organizations")
    }

    async fn list_collections(&self, organization_id: &str) -> StorageResult<Vec<Collection>> {
        let output = self
            .run(&["list", "org-collections", "--organizationid", organization_id])
            .await?;
        parse_json(&output, "collections")
    }
}

fn into_auth_error(e: StorageError) -> StorageError {
    match e {
        StorageError::CommandFailed(msg) => StorageError::AuthFailed(msg),
        StorageError::Locked => StorageError::AuthFailed("vault rejected the credentials".into()),
        other => other,
    }
}
