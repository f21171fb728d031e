//! End-to-end flows over a vault backend

use std::sync::Arc;

use sshdeck_core::app::{AppState, Effect, Key, OrganizationEntry, StateKind};
use sshdeck_core::models::{ConnectionRecord, VaultScope, VaultStatus};
use sshdeck_core::ErrorKind;

use super::fakes::{Harness, HarnessBuilder, MemoryVault, collection};

const EMAIL: &str = "ops@example.com";

fn harness(dir: &std::path::Path, vault: MemoryVault) -> Harness {
    let mut builder = HarnessBuilder::new(dir);
    builder.vault = Arc::new(vault);
    builder.vault_email = Some(EMAIL.to_string());
    builder.build()
}

fn record(name: &str) -> ConnectionRecord {
    ConnectionRecord::new(name, format!("{name}.corp"), "admin")
}

async fn open_vault(h: &mut Harness) {
    h.press(Key::Down).await;
    h.press(Key::Enter).await;
}

async fn log_in(h: &mut Harness, password: &str) {
    open_vault(h).await;
    assert_eq!(h.controller.state().kind(), StateKind::VaultLogin);
    h.type_text(password).await;
    h.press(Key::Enter).await;
}

// ========== Authentication ==========

#[tokio::test]
async fn logged_out_vault_asks_for_login() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path(), MemoryVault::new(VaultStatus::default()));

    open_vault(&mut h).await;

    let AppState::VaultLogin(form) = h.controller.state() else {
        panic!("expected the login form");
    };
    assert_eq!(form.fields()[0].value(), EMAIL);
}

#[tokio::test]
async fn locked_vault_asks_for_unlock() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MemoryVault::new(VaultStatus {
        logged_in: true,
        unlocked: false,
    })
    .with_organization("org1", Some(Vec::new()));
    let mut h = harness(dir.path(), vault);

    open_vault(&mut h).await;
    assert_eq!(h.controller.state().kind(), StateKind::VaultUnlock);

    h.type_text("correct horse").await;
    h.press(Key::Enter).await;

    let AppState::OrganizationSelect(list) = h.controller.state() else {
        panic!("expected organization select");
    };
    assert_eq!(list.items().len(), 2);
}

#[tokio::test]
async fn failed_login_drops_vault_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path(), MemoryVault::new(VaultStatus::default()));

    log_in(&mut h, "wrong").await;

    assert_eq!(h.controller.state().kind(), StateKind::StorageSelect);
    assert!(h.controller.backend().is_none());
    assert_eq!(
        h.controller.notice().unwrap().error_kind(),
        Some(ErrorKind::BackendAuth)
    );
}

#[tokio::test]
async fn unconfigured_vault_saves_settings_before_login() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = HarnessBuilder::new(dir.path());
    builder.vault = Arc::new(MemoryVault::new(VaultStatus::default()));
    let mut h = builder.build();

    open_vault(&mut h).await;
    assert_eq!(h.controller.state().kind(), StateKind::VaultConfig);

    h.type_text("https://vault.example.com").await;
    h.press(Key::Tab).await;
    h.type_text(EMAIL).await;
    h.press(Key::Enter).await;

    assert_eq!(h.controller.state().kind(), StateKind::VaultLogin);
    let effects = h.take_effects();
    let [Effect::PersistVaultSettings(settings)] = effects.as_slice() else {
        panic!("expected settings to be persisted, got {effects:?}");
    };
    assert_eq!(settings.email.as_deref(), Some(EMAIL));
    assert_eq!(settings.server_url.as_deref(), Some("https://vault.example.com"));
    assert_eq!(h.controller.config().vault.email.as_deref(), Some(EMAIL));
}

// ========== Hierarchy ==========

#[tokio::test]
async fn collection_failure_stays_on_organization_select() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MemoryVault::new(VaultStatus::default()).with_organization("org1", None);
    let mut h = harness(dir.path(), vault);
    log_in(&mut h, "correct horse").await;

    h.press(Key::Down).await;
    h.press(Key::Enter).await;

    let AppState::OrganizationSelect(list) = h.controller.state() else {
        panic!("expected to stay on organization select");
    };
    assert!(matches!(list.selected(), Some(OrganizationEntry::Organization(org)) if org.id == "org1"));
    let notice = h.controller.notice().unwrap();
    assert_eq!(notice.error_kind(), Some(ErrorKind::BackendLoad));
    assert!(notice.text.contains("org1"));
}

#[tokio::test]
async fn personal_vault_lists_only_personal_records() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MemoryVault::new(VaultStatus::READY)
        .with_organization("org1", Some(vec![collection("org1", "c1", "Servers")]))
        .with_record(VaultScope::Personal, record("home"))
        .with_record(VaultScope::collection("org1", "c1"), record("db"));
    let mut h = harness(dir.path(), vault);

    open_vault(&mut h).await;
    h.press(Key::Enter).await;

    assert_eq!(h.controller.state().kind(), StateKind::ConnectionList);
    assert_eq!(h.connection_names(), ["home"]);

    h.press(Key::Esc).await;
    assert_eq!(h.controller.state().kind(), StateKind::OrganizationSelect);
}

#[tokio::test]
async fn collection_scope_applies_to_listing_and_writes() {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(
        MemoryVault::new(VaultStatus::READY)
            .with_organization(
                "org1",
                Some(vec![
                    collection("org1", "c1", "Servers"),
                    collection("org1", "c2", "Databases"),
                ]),
            )
            .with_record(VaultScope::collection("org1", "c1"), record("web"))
            .with_record(VaultScope::collection("org1", "c2"), record("db")),
    );
    let mut builder = HarnessBuilder::new(dir.path());
    builder.vault = Arc::clone(&vault);
    builder.vault_email = Some(EMAIL.to_string());
    let mut h = builder.build();

    open_vault(&mut h).await;
    h.press(Key::Down).await;
    h.press(Key::Enter).await;
    let AppState::CollectionSelect { organization, list } = h.controller.state() else {
        panic!("expected collection select");
    };
    assert_eq!(organization.id, "org1");
    assert_eq!(list.items().len(), 2);

    h.press(Key::Down).await;
    h.press(Key::Enter).await;
    assert_eq!(h.connection_names(), ["db"]);
    assert_eq!(
        h.controller.backend().unwrap().scope(),
        Some(&VaultScope::collection("org1", "c2"))
    );

    h.press(Key::Char('a')).await;
    h.type_text("replica").await;
    h.press(Key::Tab).await;
    h.type_text("replica.corp").await;
    h.press(Key::Enter).await;

    assert_eq!(h.connection_names(), ["db", "replica"]);
    assert_eq!(vault.scopes_of("replica"), [VaultScope::collection("org1", "c2")]);

    h.press(Key::Esc).await;
    let AppState::CollectionSelect { list, .. } = h.controller.state() else {
        panic!("expected to return to collection select");
    };
    assert_eq!(list.items().len(), 2);
    h.press(Key::Esc).await;
    assert_eq!(h.controller.state().kind(), StateKind::OrganizationSelect);
    h.press(Key::Esc).await;
    assert_eq!(h.controller.state().kind(), StateKind::StorageSelect);
    assert!(h.controller.backend().is_none());
}

#[tokio::test]
async fn failed_vault_delete_reports_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(
        MemoryVault::new(VaultStatus::READY).with_record(VaultScope::Personal, record("home")),
    );
    let mut builder = HarnessBuilder::new(dir.path());
    builder.vault = Arc::clone(&vault);
    builder.vault_email = Some(EMAIL.to_string());
    let mut h = builder.build();

    open_vault(&mut h).await;
    h.press(Key::Enter).await;
    // someone else removed it in the meantime
    vault.records.lock().unwrap().clear();

    h.press(Key::Char('d')).await;
    h.press(Key::Char('y')).await;

    assert!(h.connection_names().is_empty());
    assert_eq!(
        h.controller.notice().unwrap().error_kind(),
        Some(ErrorKind::Persistence)
    );
}
