//! The application state machine
//!
//! [`StateController::handle`] takes one event at a time and returns the
//! effects the shell has to carry out. It never performs IO itself: every
//! storage call and launch goes out as [`Effect::Run`] and comes back as
//! [`AppEvent::Completed`]. While a request is outstanding only quitting
//! and Escape are accepted, and a reply is applied only if its token
//! matches the outstanding request. Replies to abandoned requests never
//! change the state, but their outside effects are still reconciled: a
//! finished write triggers a reload and an unused key file is removed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{AppSettings, DefaultLaunchMode, VaultSettings};
use crate::error::ErrorKind;
use crate::launcher::{LaunchEnvironment, LaunchMode};
use crate::models::{Collection, ConnectionRecord, Organization, VaultScope};
use crate::storage::{BackendFactory, StorageBackend, StorageOp, StorageReply, VaultService};

use super::event::{AppEvent, Effect, LaunchReply, Task, TaskKind, TaskReply, Token};
use super::forms;
use super::keys::Key;
use super::state::{AppState, OrganizationEntry, StateKind, StorageChoice};
use super::widgets::{FormSignal, FormState, ListSignal, SelectList};

/// Startup facts and preferences the controller reads but never changes,
/// apart from vault settings submitted in the UI
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Platform and multiplexer availability
    pub environment: LaunchEnvironment,
    /// Mode used by Enter on the connection list
    pub default_mode: DefaultLaunchMode,
    /// Vault server and account
    pub vault: VaultSettings,
    /// Remove materialized keys when the embedded session ends
    pub cleanup_keys: bool,
}

impl ControllerConfig {
    /// Builds the configuration from loaded settings
    #[must_use]
    pub fn from_settings(settings: &AppSettings, environment: LaunchEnvironment) -> Self {
        Self {
            environment,
            default_mode: settings.launch.default_mode,
            vault: settings.vault.clone(),
            cleanup_keys: settings.keys.cleanup_after_session,
        }
    }

    /// Mode used when a connection is opened with Enter
    #[must_use]
    pub const fn enter_mode(&self) -> LaunchMode {
        self.default_mode
            .resolve(self.environment.external_available())
    }
}

/// Severity of a [`Notice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Something was degraded but still happened
    Warning,
    /// A failure of the given kind
    Error(ErrorKind),
}

/// Transient message shown until the next key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Message text
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    fn error(kind: ErrorKind, text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error(kind),
            text: text.into(),
        }
    }

    /// Error kind, for error notices
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self.level {
            NoticeLevel::Error(kind) => Some(kind),
            NoticeLevel::Info | NoticeLevel::Warning => None,
        }
    }
}

/// What to do with the reply of the outstanding request
#[derive(Debug)]
enum Then {
    /// Local connections loaded: enter the list
    OpenLocal,
    /// Vault status known: log in, unlock or list organizations
    VaultStatus,
    /// Login or unlock finished: list organizations
    Authenticated,
    /// Organizations listed: enter organization selection
    Organizations,
    /// Collections of the organization listed
    Collections(Organization),
    /// Scoped connections loaded: enter the list
    EnterList,
    /// Add, edit or delete finished: reload
    Persisted,
    /// Reload finished: replace the list
    Reloaded,
    /// Launch pipeline finished
    Launch,
}

#[derive(Debug)]
struct Pending {
    token: Token,
    label: &'static str,
    then: Then,
}

/// Result of a key press on the active widget
#[derive(Debug)]
enum Action {
    None,
    ChooseStorage(StorageChoice),
    ConfigureVault,
    SubmitVaultConfig,
    SubmitLogin,
    SubmitUnlock,
    ChooseOrganization(OrganizationEntry),
    ChooseCollection(Collection),
    Launch(LaunchMode),
    Add,
    Edit,
    Delete,
    Reload,
    ConfirmDelete(String),
    CancelDelete,
    SubmitConnection,
    SubmitPassword,
}

fn on_submit(form: &mut FormState, key: &Key, action: Action) -> Action {
    match form.handle(key) {
        FormSignal::Submit => action,
        FormSignal::Idle => Action::None,
    }
}

fn chosen<'a, T>(list: &'a mut SelectList<T>, key: &Key) -> Option<&'a T> {
    match list.handle(key) {
        ListSignal::Chosen(index) => list.items().get(index),
        ListSignal::Idle => None,
    }
}

/// The finite-state machine driving the UI
pub struct StateController {
    config: ControllerConfig,
    factory: Arc<dyn BackendFactory>,
    state: AppState,
    backend: Option<StorageBackend>,
    vault_client: Option<Arc<dyn VaultService>>,
    connections: SelectList<ConnectionRecord>,
    pending: Option<Pending>,
    last_token: Token,
    /// An abandoned write finished while another request was outstanding
    reload_owed: bool,
    notice: Option<Notice>,
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("state", &self.state.kind())
            .field("backend", &self.backend)
            .field("pending", &self.pending)
            .field("notice", &self.notice)
            .finish_non_exhaustive()
    }
}

impl StateController {
    /// Creates a controller in the storage selection state
    #[must_use]
    pub fn new(config: ControllerConfig, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            config,
            factory,
            state: AppState::storage_select(),
            backend: None,
            vault_client: None,
            connections: SelectList::default(),
            pending: None,
            last_token: 0,
            reload_owed: false,
            notice: None,
        }
    }

    /// Active state
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Connection list shown in [`AppState::ConnectionList`]
    #[must_use]
    pub const fn connections(&self) -> &SelectList<ConnectionRecord> {
        &self.connections
    }

    /// Active backend, once one was opened
    #[must_use]
    pub const fn backend(&self) -> Option<&StorageBackend> {
        self.backend.as_ref()
    }

    /// Current message
    #[must_use]
    pub const fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Name of the outstanding request, if any
    #[must_use]
    pub fn loading(&self) -> Option<&'static str> {
        self.pending.as_ref().map(|p| p.label)
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// State Escape leads to from the connection list
    #[must_use]
    pub fn connection_list_parent(&self) -> StateKind {
        match self.backend.as_ref().and_then(StorageBackend::scope) {
            None => StateKind::StorageSelect,
            Some(VaultScope::Personal) => StateKind::OrganizationSelect,
            Some(VaultScope::Collection { .. }) => StateKind::CollectionSelect,
        }
    }

    /// Processes one event and returns the effects to carry out
    pub fn handle(&mut self, event: AppEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            AppEvent::Input(key) => self.on_input(&key, &mut effects),
            AppEvent::Completed { token, reply } => self.on_completed(token, reply, &mut effects),
            AppEvent::SessionEnded { exit_code, error } => {
                self.on_session_ended(exit_code, error, &mut effects);
            }
        }
        effects
    }

    fn on_input(&mut self, key: &Key, fx: &mut Vec<Effect>) {
        let kind = self.state.kind();
        if key.is_interrupt() || (*key == Key::Char('q') && quits_on_q(kind)) {
            fx.push(Effect::Quit);
            return;
        }
        if let Some(pending) = self.pending.as_ref() {
            if *key == Key::Esc {
                info!(op = pending.label, token = pending.token, "Request abandoned");
                self.pending = None;
                self.notice = Some(Notice::info("Cancelled"));
                if kind == StateKind::StorageSelect {
                    self.backend = None;
                }
            }
            return;
        }

        self.notice = None;
        if *key == Key::Esc {
            self.escape();
            return;
        }

        let action = match &mut self.state {
            AppState::StorageSelect(list) => match key {
                Key::Char('c') => Action::ConfigureVault,
                _ => chosen(list, key).map_or(Action::None, |c| Action::ChooseStorage(*c)),
            },
            AppState::VaultConfig(form) => on_submit(form, key, Action::SubmitVaultConfig),
            AppState::VaultLogin(form) => on_submit(form, key, Action::SubmitLogin),
            AppState::VaultUnlock(form) => on_submit(form, key, Action::SubmitUnlock),
            AppState::OrganizationSelect(list) => {
                chosen(list, key).map_or(Action::None, |e| Action::ChooseOrganization(e.clone()))
            }
            AppState::CollectionSelect { list, .. } => {
                chosen(list, key).map_or(Action::None, |c| Action::ChooseCollection(c.clone()))
            }
            AppState::ConnectionList => match key {
                Key::Char('a') => Action::Add,
                Key::Char('e') => Action::Edit,
                Key::Char('d') => Action::Delete,
                Key::Char('r') => Action::Reload,
                Key::Char('s') => Action::Launch(LaunchMode::Embedded),
                Key::Char('w') => Action::Launch(LaunchMode::ExternalWindow),
                _ => match self.connections.handle(key) {
                    ListSignal::Chosen(_) => Action::Launch(self.config.enter_mode()),
                    ListSignal::Idle => Action::None,
                },
            },
            AppState::AddConnection(form) | AppState::EditConnection { form, .. } => {
                on_submit(form, key, Action::SubmitConnection)
            }
            AppState::ConfirmDelete { id, .. } => match key {
                Key::Char('y' | 'Y') => Action::ConfirmDelete(id.clone()),
                Key::Char('n' | 'N') => Action::CancelDelete,
                _ => Action::None,
            },
            AppState::PasswordPrompt { form, .. } => on_submit(form, key, Action::SubmitPassword),
            AppState::LiveSession { .. } => Action::None,
        };
        self.perform(action, fx);
    }

    fn perform(&mut self, action: Action, fx: &mut Vec<Effect>) {
        match action {
            Action::None => {}
            Action::ChooseStorage(StorageChoice::Local) => self.open_local(fx),
            Action::ChooseStorage(StorageChoice::Vault) => self.open_vault(fx),
            Action::ConfigureVault => {
                self.state = AppState::VaultConfig(forms::vault_config(&self.config.vault));
            }
            Action::SubmitVaultConfig => self.submit_vault_config(fx),
            Action::SubmitLogin => self.submit_login(fx),
            Action::SubmitUnlock => self.submit_unlock(fx),
            Action::ChooseOrganization(OrganizationEntry::Personal) => {
                self.load_scope(VaultScope::Personal, fx);
            }
            Action::ChooseOrganization(OrganizationEntry::Organization(org)) => {
                let op = StorageOp::LoadCollections {
                    organization_id: org.id.clone(),
                };
                self.start_storage(op, Then::Collections(org), fx);
            }
            Action::ChooseCollection(collection) => {
                let scope = VaultScope::collection(collection.organization_id, collection.id);
                self.load_scope(scope, fx);
            }
            Action::Launch(mode) => {
                if let Some(record) = self.connections.selected().cloned() {
                    info!(connection_id = %record.id, %mode, "Launching");
                    self.start(TaskKind::Launch { record, mode }, Then::Launch, fx);
                }
            }
            Action::Add => self.state = AppState::AddConnection(forms::connection(None)),
            Action::Edit => {
                if let Some(record) = self.connections.selected() {
                    self.state = AppState::EditConnection {
                        id: record.id.clone(),
                        form: forms::connection(Some(record)),
                    };
                }
            }
            Action::Delete => {
                if let Some(record) = self.connections.selected() {
                    self.state = AppState::ConfirmDelete {
                        id: record.id.clone(),
                        name: record.name.clone(),
                    };
                }
            }
            Action::Reload => self.reload(fx),
            Action::ConfirmDelete(id) => {
                self.state = AppState::ConnectionList;
                if let Some(op) = self.backend.as_ref().map(|b| b.delete_op(id)) {
                    self.start_storage(op, Then::Persisted, fx);
                }
            }
            Action::CancelDelete => self.state = AppState::ConnectionList,
            Action::SubmitConnection => self.submit_connection(fx),
            Action::SubmitPassword => self.submit_password(fx),
        }
    }

    // ---- transitions -------------------------------------------------------

    fn open_local(&mut self, fx: &mut Vec<Effect>) {
        self.backend = Some(StorageBackend::local(self.factory.local()));
        self.start_storage(StorageOp::Load { scope: None }, Then::OpenLocal, fx);
    }

    fn open_vault(&mut self, fx: &mut Vec<Effect>) {
        if !self.config.vault.is_configured() {
            self.state = AppState::VaultConfig(forms::vault_config(&self.config.vault));
            return;
        }
        let client = match &self.vault_client {
            Some(client) => Arc::clone(client),
            None => {
                let client = self.factory.vault(&self.config.vault);
                self.vault_client = Some(Arc::clone(&client));
                client
            }
        };
        self.backend = Some(StorageBackend::vault(client));
        self.start_storage(StorageOp::Status, Then::VaultStatus, fx);
    }

    fn submit_vault_config(&mut self, fx: &mut Vec<Effect>) {
        let AppState::VaultConfig(form) = &mut self.state else {
            return;
        };
        let Some(email) = form.optional(forms::EMAIL) else {
            form.set_error("Email is required");
            return;
        };
        let settings = VaultSettings {
            server_url: form.optional(forms::SERVER_URL),
            email: Some(email),
            ..self.config.vault.clone()
        };

        self.vault_client = Some(self.factory.vault(&settings));
        self.backend = self.vault_client.clone().map(StorageBackend::vault);
        self.state = AppState::VaultLogin(forms::vault_login(settings.email.as_deref()));
        self.config.vault = settings.clone();
        fx.push(Effect::PersistVaultSettings(settings));
    }

    fn submit_login(&mut self, fx: &mut Vec<Effect>) {
        let AppState::VaultLogin(form) = &mut self.state else {
            return;
        };
        let Some(email) = form.optional(forms::EMAIL) else {
            form.set_error("Email is required");
            return;
        };
        let Some(password) = form.secret(forms::PASSWORD) else {
            form.set_error("Master password is required");
            return;
        };
        let otp = form.optional(forms::OTP);

        if self.config.vault.email.as_deref() != Some(email.as_str()) {
            self.config.vault.email = Some(email.clone());
            fx.push(Effect::PersistVaultSettings(self.config.vault.clone()));
        }
        let op = StorageOp::Login {
            email,
            password,
            otp,
        };
        self.start_storage(op, Then::Authenticated, fx);
    }

    fn submit_unlock(&mut self, fx: &mut Vec<Effect>) {
        let AppState::VaultUnlock(form) = &mut self.state else {
            return;
        };
        let Some(password) = form.secret(forms::PASSWORD) else {
            form.set_error("Master password is required");
            return;
        };
        self.start_storage(StorageOp::Unlock { password }, Then::Authenticated, fx);
    }

    fn load_scope(&mut self, scope: VaultScope, fx: &mut Vec<Effect>) {
        if let Some(op) = self.backend.as_ref().map(|b| b.load_op(Some(scope))) {
            self.start_storage(op, Then::EnterList, fx);
        }
    }

    fn reload(&mut self, fx: &mut Vec<Effect>) {
        self.reload_owed = false;
        if let Some(op) = self.backend.as_ref().map(StorageBackend::reload_op) {
            self.start_storage(op, Then::Reloaded, fx);
        }
    }

    fn submit_connection(&mut self, fx: &mut Vec<Effect>) {
        let (result, editing) = match &self.state {
            AppState::AddConnection(form) => (forms::record_from(form, None), false),
            AppState::EditConnection { id, form } => (forms::record_from(form, Some(id)), true),
            _ => return,
        };
        let record = match result {
            Ok(record) => record,
            Err(message) => {
                if let Some(form) = self.active_form_mut() {
                    form.set_error(message);
                }
                return;
            }
        };
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let op = if editing {
            backend.edit_op(record)
        } else {
            backend.add_op(record)
        };
        self.state = AppState::ConnectionList;
        self.start_storage(op, Then::Persisted, fx);
    }

    fn submit_password(&mut self, fx: &mut Vec<Effect>) {
        let AppState::PasswordPrompt { record, mode, form } = &mut self.state else {
            return;
        };
        let Some(password) = form.secret(forms::PASSWORD) else {
            form.set_error("Password is required");
            return;
        };
        let mut record = record.clone();
        let mode = *mode;
        record.use_password = true;
        record.password = Some(password);

        self.state = AppState::ConnectionList;
        self.start(TaskKind::Launch { record, mode }, Then::Launch, fx);
    }

    fn escape(&mut self) {
        let kind = self.state.kind();
        let Some(parent) = kind.parent(self.connection_list_parent()) else {
            return;
        };
        debug!(from = ?kind, to = ?parent, "Escape");
        match parent {
            StateKind::OrganizationSelect => self.state = self.organization_state(),
            StateKind::CollectionSelect => match self.collection_state() {
                Some(state) => self.state = state,
                None => self.state = self.organization_state(),
            },
            StateKind::ConnectionList => self.state = AppState::ConnectionList,
            _ => self.reset_to_root(),
        }
    }

    fn reset_to_root(&mut self) {
        self.backend = None;
        self.connections = SelectList::default();
        self.state = AppState::storage_select();
    }

    fn organization_state(&self) -> AppState {
        let mut entries = vec![OrganizationEntry::Personal];
        if let Some(vault) = self.backend.as_ref().and_then(StorageBackend::as_vault) {
            entries.extend(
                vault
                    .organizations()
                    .iter()
                    .cloned()
                    .map(OrganizationEntry::Organization),
            );
        }
        AppState::OrganizationSelect(SelectList::new(entries))
    }

    fn collection_state(&self) -> Option<AppState> {
        let vault = self.backend.as_ref()?.as_vault()?;
        let org_id = vault.collections_org()?;
        let organization = vault
            .organizations()
            .iter()
            .find(|o| o.id == org_id)?
            .clone();
        Some(AppState::CollectionSelect {
            organization,
            list: SelectList::new(vault.collections().to_vec()),
        })
    }

    fn active_form_mut(&mut self) -> Option<&mut FormState> {
        match &mut self.state {
            AppState::VaultConfig(form)
            | AppState::VaultLogin(form)
            | AppState::VaultUnlock(form)
            | AppState::AddConnection(form)
            | AppState::EditConnection { form, .. }
            | AppState::PasswordPrompt { form, .. } => Some(form),
            _ => None,
        }
    }

    // ---- requests ----------------------------------------------------------

    fn start(&mut self, kind: TaskKind, then: Then, fx: &mut Vec<Effect>) {
        self.last_token += 1;
        let token = self.last_token;
        let label = match &kind {
            TaskKind::Storage { op, .. } => op.name(),
            TaskKind::Launch { .. } => "launch",
        };
        debug!(token, op = label, "Request started");
        self.pending = Some(Pending { token, label, then });
        fx.push(Effect::Run(Task { token, kind }));
    }

    fn start_storage(&mut self, op: StorageOp, then: Then, fx: &mut Vec<Effect>) {
        let Some(handle) = self.backend.as_ref().map(StorageBackend::handle) else {
            warn!(op = op.name(), "No backend open");
            return;
        };
        self.start(TaskKind::Storage { handle, op }, then, fx);
    }

    fn on_completed(&mut self, token: Token, reply: TaskReply, fx: &mut Vec<Effect>) {
        match self.pending.take_if(|p| p.token == token) {
            Some(pending) => self.apply_reply(pending.then, reply, fx),
            None => self.on_abandoned(token, reply, fx),
        }
        if self.reload_owed && self.pending.is_none() {
            self.reload(fx);
        }
    }

    /// Reconciles the outside effects of a reply nobody waits for
    fn on_abandoned(&mut self, token: Token, reply: TaskReply, fx: &mut Vec<Effect>) {
        match reply {
            TaskReply::Storage(StorageReply::Persisted(result)) => {
                info!(token, ok = result.is_ok(), "Abandoned write finished");
                self.notice = Some(match result {
                    Ok(()) => Notice::info("Saved"),
                    Err(e) => Notice::error(ErrorKind::Persistence, e.to_string()),
                });
                self.reload_owed = true;
            }
            TaskReply::Launch(LaunchReply::Embedded { session, .. }) => {
                if let Some(path) = session.materialized_key {
                    debug!(token, path = %path.display(), "Removing key of abandoned session");
                    fx.push(Effect::RemoveKeyFile(path));
                }
            }
            reply => debug!(token, ?reply, "Dropping stale reply"),
        }
    }

    fn apply_reply(&mut self, then: Then, reply: TaskReply, fx: &mut Vec<Effect>) {
        match (then, reply) {
            (Then::OpenLocal, TaskReply::Storage(StorageReply::Connections { scope, result })) => {
                self.enter_list(scope, result, true);
            }
            (Then::VaultStatus, TaskReply::Storage(StorageReply::Status(result))) => {
                self.on_vault_status(result, fx);
            }
            (Then::Authenticated, TaskReply::Storage(StorageReply::Authenticated(result))) => {
                match result {
                    Ok(()) => {
                        if let Some(vault) = self.backend.as_mut().and_then(StorageBackend::as_vault_mut) {
                            vault.mark_ready();
                        }
                        self.start_storage(StorageOp::ListOrganizations, Then::Organizations, fx);
                    }
                    Err(e) => {
                        warn!(error = %e, "Vault authentication failed");
                        self.reset_to_root();
                        self.notice = Some(Notice::error(ErrorKind::BackendAuth, e.to_string()));
                    }
                }
            }
            (Then::Organizations, TaskReply::Storage(StorageReply::Organizations(result))) => {
                let applied = self
                    .backend
                    .as_mut()
                    .and_then(StorageBackend::as_vault_mut)
                    .map(|vault| vault.apply_organizations(result));
                match applied {
                    Some(Ok(())) => self.state = self.organization_state(),
                    Some(Err(e)) => {
                        self.reset_to_root();
                        self.notice = Some(Notice::error(ErrorKind::BackendLoad, e.to_string()));
                    }
                    None => {}
                }
            }
            (
                Then::Collections(organization),
                TaskReply::Storage(StorageReply::Collections {
                    organization_id,
                    result,
                }),
            ) => {
                let Some(vault) = self.backend.as_mut().and_then(StorageBackend::as_vault_mut) else {
                    return;
                };
                match vault.apply_collections(organization_id, result) {
                    Ok(()) => {
                        self.state = AppState::CollectionSelect {
                            list: SelectList::new(vault.collections().to_vec()),
                            organization,
                        };
                    }
                    Err(e) => {
                        self.notice = Some(Notice::error(ErrorKind::BackendLoad, e.to_string()));
                    }
                }
            }
            (Then::EnterList, TaskReply::Storage(StorageReply::Connections { scope, result })) => {
                self.enter_list(scope, result, false);
            }
            (Then::Reloaded, TaskReply::Storage(StorageReply::Connections { scope, result })) => {
                let Some(backend) = self.backend.as_mut() else {
                    return;
                };
                match backend.apply_connections(scope, result) {
                    Ok(_) => self.connections.set_items(backend.list().to_vec()),
                    Err(e) => {
                        self.notice = Some(Notice::error(ErrorKind::BackendLoad, e.to_string()));
                    }
                }
            }
            (Then::Persisted, TaskReply::Storage(StorageReply::Persisted(result))) => {
                match result {
                    Ok(()) => self.notice = Some(Notice::info("Saved")),
                    Err(e) => {
                        warn!(error = %e, "Persisting connection failed");
                        self.notice = Some(Notice::error(ErrorKind::Persistence, e.to_string()));
                    }
                }
                self.reload(fx);
            }
            (Then::Launch, TaskReply::Launch(reply)) => self.on_launch(reply, fx),
            (then, reply) => warn!(?then, ?reply, "Reply does not match the pending request"),
        }
    }

    fn on_vault_status(
        &mut self,
        result: crate::error::StorageResult<crate::models::VaultStatus>,
        fx: &mut Vec<Effect>,
    ) {
        let Some(vault) = self.backend.as_mut().and_then(StorageBackend::as_vault_mut) else {
            return;
        };
        match vault.apply_status(result) {
            Ok(status) if !status.logged_in => {
                self.state = AppState::VaultLogin(forms::vault_login(self.config.vault.email.as_deref()));
            }
            Ok(status) if !status.unlocked => {
                self.state = AppState::VaultUnlock(forms::vault_unlock());
            }
            Ok(_) => self.start_storage(StorageOp::ListOrganizations, Then::Organizations, fx),
            Err(e) => {
                self.reset_to_root();
                self.notice = Some(Notice::error(ErrorKind::BackendLoad, e.to_string()));
            }
        }
    }

    fn enter_list(
        &mut self,
        scope: Option<VaultScope>,
        result: crate::error::StorageResult<Vec<ConnectionRecord>>,
        drop_on_failure: bool,
    ) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match backend.apply_connections(scope, result) {
            Ok(count) => {
                info!(count, "Entering connection list");
                self.connections = SelectList::new(backend.list().to_vec());
                self.state = AppState::ConnectionList;
            }
            Err(e) => {
                if drop_on_failure {
                    self.backend = None;
                }
                self.notice = Some(Notice::error(ErrorKind::BackendLoad, e.to_string()));
            }
        }
    }

    fn on_launch(&mut self, reply: LaunchReply, fx: &mut Vec<Effect>) {
        match reply {
            LaunchReply::PasswordRequired {
                record,
                mode,
                reason,
            } => {
                self.notice = Some(Notice::error(ErrorKind::CredentialUnavailable, reason));
                self.state = AppState::PasswordPrompt {
                    form: forms::password_prompt(&record),
                    record,
                    mode,
                };
            }
            LaunchReply::Embedded { session, warnings } => {
                if !warnings.is_empty() {
                    self.notice = Some(Notice::warning(warnings.join("; ")));
                }
                self.state = AppState::LiveSession {
                    title: session.title.clone(),
                    materialized_key: session.materialized_key.clone(),
                };
                fx.push(Effect::EnterSession(session));
            }
            LaunchReply::Launched { title, warnings } => {
                self.notice = Some(if warnings.is_empty() {
                    Notice::info(format!("Opened {title}"))
                } else {
                    Notice::warning(format!("Opened {title}: {}", warnings.join("; ")))
                });
            }
            LaunchReply::Failed(e) => {
                warn!(error = %e, "Launch failed");
                self.notice = Some(Notice::error(ErrorKind::Launch, e.to_string()));
            }
        }
    }

    fn on_session_ended(
        &mut self,
        exit_code: Option<i32>,
        error: Option<String>,
        fx: &mut Vec<Effect>,
    ) {
        let AppState::LiveSession {
            materialized_key, ..
        } = &mut self.state
        else {
            debug!("Session end outside a live session");
            return;
        };
        if self.config.cleanup_keys
            && let Some(path) = materialized_key.take()
        {
            fx.push(Effect::RemoveKeyFile(path));
        }

        self.notice = match (error, exit_code) {
            (Some(error), _) => Some(Notice::error(ErrorKind::Launch, error)),
            (None, Some(code)) if code != 0 => {
                Some(Notice::warning(format!("Session exited with status {code}")))
            }
            (None, _) => Some(Notice::info("Session ended")),
        };
        self.state = AppState::ConnectionList;
        self.connections.reset_selection();
    }
}

const fn quits_on_q(kind: StateKind) -> bool {
    matches!(
        kind,
        StateKind::StorageSelect
            | StateKind::OrganizationSelect
            | StateKind::CollectionSelect
            | StateKind::ConnectionList
    )
}
