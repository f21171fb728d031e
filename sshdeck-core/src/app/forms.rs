//! Form layouts and their conversion to domain values

use std::path::PathBuf;

use secrecy::ExposeSecret;

use crate::config::VaultSettings;
use crate::models::ConnectionRecord;

use super::widgets::{FormField, FormState};

pub(crate) const SERVER_URL: &str = "server_url";
pub(crate) const EMAIL: &str = "email";
pub(crate) const PASSWORD: &str = "password";
pub(crate) const OTP: &str = "otp";

pub(crate) const NAME: &str = "name";
pub(crate) const HOST: &str = "host";
pub(crate) const PORT: &str = "port";
pub(crate) const USERNAME: &str = "username";
pub(crate) const USE_PASSWORD: &str = "use_password";
pub(crate) const PRIVATE_KEY: &str = "private_key";
pub(crate) const PUBLIC_KEY: &str = "public_key";
pub(crate) const KEY_FILE: &str = "key_file";

pub(crate) fn vault_config(settings: &VaultSettings) -> FormState {
    FormState::new(
        "Vault configuration",
        vec![
            FormField::text(SERVER_URL, "Server URL (empty for bitwarden.com)")
                .with_value(settings.server_url.clone().unwrap_or_default()),
            FormField::text(EMAIL, "Email").with_value(settings.email.clone().unwrap_or_default()),
        ],
    )
}

pub(crate) fn vault_login(email: Option<&str>) -> FormState {
    let mut form = FormState::new(
        "Vault login",
        vec![
            FormField::text(EMAIL, "Email").with_value(email.unwrap_or_default()),
            FormField::secret(PASSWORD, "Master password"),
            FormField::text(OTP, "Two-step code (optional)"),
        ],
    );
    if email.is_some_and(|e| !e.is_empty()) {
        form.focus_field(PASSWORD);
    }
    form
}

pub(crate) fn vault_unlock() -> FormState {
    FormState::new(
        "Unlock vault",
        vec![FormField::secret(PASSWORD, "Master password")],
    )
}

pub(crate) fn password_prompt(record: &ConnectionRecord) -> FormState {
    FormState::new(
        format!("Password for {}", record.destination()),
        vec![FormField::secret(PASSWORD, "Password")],
    )
}

pub(crate) fn connection(record: Option<&ConnectionRecord>) -> FormState {
    let title = if record.is_some() {
        "Edit connection"
    } else {
        "New connection"
    };
    let secret = |value: Option<&secrecy::SecretString>| {
        value
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_default()
    };
    let port = record
        .map(|r| r.port)
        .filter(|p| *p != 0)
        .map(|p| p.to_string())
        .unwrap_or_default();

    FormState::new(
        title,
        vec![
            FormField::text(NAME, "Name").with_value(record.map(|r| r.name.clone()).unwrap_or_default()),
            FormField::text(HOST, "Host").with_value(record.map(|r| r.host.clone()).unwrap_or_default()),
            FormField::text(PORT, "Port").with_value(port),
            FormField::text(USERNAME, "Username")
                .with_value(record.map(|r| r.username.clone()).unwrap_or_default()),
            FormField::toggle(USE_PASSWORD, "Password authentication")
                .with_checked(record.is_some_and(|r| r.use_password)),
            FormField::secret(PASSWORD, "Password")
                .with_value(secret(record.and_then(|r| r.password.as_ref()))),
            FormField::secret(PRIVATE_KEY, "Private key (paste)")
                .with_value(secret(record.and_then(|r| r.private_key.as_ref()))),
            FormField::text(PUBLIC_KEY, "Public key")
                .with_value(record.and_then(|r| r.public_key.clone()).unwrap_or_default()),
            FormField::text(KEY_FILE, "Key file")
                .with_value(
                    record
                        .and_then(|r| r.key_file.as_ref())
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                ),
        ],
    )
}

/// Builds a record from the connection form
///
/// Name and host are required; an empty port means the default.
pub(crate) fn record_from(form: &FormState, id: Option<&str>) -> Result<ConnectionRecord, String> {
    let name = form.text(NAME);
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    let host = form.text(HOST);
    if host.is_empty() {
        return Err("Host is required".to_string());
    }
    let port_text = form.text(PORT);
    let port = if port_text.is_empty() {
        0
    } else {
        port_text
            .parse::<u16>()
            .map_err(|_| format!("Invalid port: {port_text}"))?
    };

    let mut record = ConnectionRecord::new(name, host, form.text(USERNAME)).with_port(port);
    if let Some(id) = id {
        record.id = id.to_string();
    }
    record.use_password = form.checked(USE_PASSWORD);
    if record.use_password {
        record.password = form.secret(PASSWORD);
    } else {
        record.private_key = form.secret(PRIVATE_KEY);
    }
    record.public_key = form.optional(PUBLIC_KEY);
    record.key_file = form.optional(KEY_FILE).map(PathBuf::from);
    Ok(record)
}
