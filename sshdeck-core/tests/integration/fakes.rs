//! Fakes for the process, keyring and vault seams, and a controller harness

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sshdeck_core::app::{AppEvent, ControllerConfig, Effect, Key, StateController, Task, TaskRunner};
use sshdeck_core::config::{DefaultLaunchMode, VaultSettings};
use sshdeck_core::error::{LaunchResult, SecretResult, StorageError, StorageResult};
use sshdeck_core::launcher::{
    LaunchEnvironment, Platform, ProcessSpawner, SessionLauncher, SpawnCommand, ToolProbe,
};
use sshdeck_core::models::{Collection, ConnectionRecord, Organization, VaultScope, VaultStatus};
use sshdeck_core::secret::{CredentialResolver, KeyMaterializer, SecretStore};
use sshdeck_core::storage::{BackendFactory, ConnectionStore, LocalStore, VaultService};

pub const SERVICE: &str = "sshdeck-test";

/// Probe that finds exactly the listed tools
pub struct FakeProbe(HashSet<&'static str>);

impl FakeProbe {
    pub fn with(tools: &[&'static str]) -> Arc<Self> {
        Arc::new(Self(tools.iter().copied().collect()))
    }
}

impl ToolProbe for FakeProbe {
    fn find(&self, tool: &str) -> Option<PathBuf> {
        self.0
            .contains(tool)
            .then(|| PathBuf::from(format!("/usr/bin/{tool}")))
    }
}

/// Spawner recording commands instead of running them
#[derive(Default)]
pub struct RecordingSpawner {
    commands: Mutex<Vec<SpawnCommand>>,
}

impl RecordingSpawner {
    pub fn commands(&self) -> Vec<SpawnCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessSpawner for RecordingSpawner {
    async fn run(&self, command: &SpawnCommand) -> LaunchResult<()> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(())
    }
}

/// In-memory keyring
#[derive(Default)]
pub struct MemorySecrets {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecrets {
    pub fn insert(&self, account: &str, secret: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert((SERVICE.to_string(), account.to_string()), secret.to_string());
    }

    pub fn lookup(&self, account: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(SERVICE.to_string(), account.to_string()))
            .cloned()
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn get(&self, service: &str, account: &str) -> SecretResult<Option<SecretString>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(service.to_string(), account.to_string()))
            .map(|s| SecretString::from(s.clone())))
    }

    async fn set(&self, service: &str, account: &str, secret: &SecretString) -> SecretResult<()> {
        self.entries.lock().unwrap().insert(
            (service.to_string(), account.to_string()),
            secret.expose_secret().to_string(),
        );
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> SecretResult<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

/// In-memory vault with an organization → collection hierarchy
pub struct MemoryVault {
    pub master_password: &'static str,
    pub status: Mutex<VaultStatus>,
    pub organizations: Vec<Organization>,
    pub collections: HashMap<String, Vec<Collection>>,
    pub records: Mutex<Vec<(VaultScope, ConnectionRecord)>>,
}

impl MemoryVault {
    pub fn new(status: VaultStatus) -> Self {
        Self {
            master_password: "correct horse",
            status: Mutex::new(status),
            organizations: Vec::new(),
            collections: HashMap::new(),
            records: Mutex::default(),
        }
    }

    pub fn with_organization(mut self, id: &str, collections: Option<Vec<Collection>>) -> Self {
        self.organizations.push(Organization {
            id: id.to_string(),
            name: id.to_uppercase(),
        });
        if let Some(collections) = collections {
            self.collections.insert(id.to_string(), collections);
        }
        self
    }

    pub fn with_record(self, scope: VaultScope, record: ConnectionRecord) -> Self {
        self.records.lock().unwrap().push((scope, record));
        self
    }

    pub fn scopes_of(&self, name: &str) -> Vec<VaultScope> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn check_password(&self, password: &SecretString) -> StorageResult<()> {
        if password.expose_secret() != self.master_password {
            return Err(StorageError::AuthFailed("Invalid master password".into()));
        }
        *self.status.lock().unwrap() = VaultStatus::READY;
        Ok(())
    }
}

pub fn collection(org: &str, id: &str, name: &str) -> Collection {
    Collection {
        id: id.to_string(),
        name: name.to_string(),
        organization_id: org.to_string(),
    }
}

#[async_trait]
impl ConnectionStore for MemoryVault {
    fn backend_name(&self) -> &'static str {
        "memory-vault"
    }

    async fn load(&self, scope: Option<&VaultScope>) -> StorageResult<Vec<ConnectionRecord>> {
        let scope = scope.ok_or_else(|| StorageError::CommandFailed("no scope".into()))?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == scope)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn add(&self, record: &ConnectionRecord, scope: Option<&VaultScope>) -> StorageResult<()> {
        let scope = scope.cloned().unwrap_or(VaultScope::Personal);
        self.records.lock().unwrap().push((scope, record.clone()));
        Ok(())
    }

    async fn edit(&self, record: &ConnectionRecord, _: Option<&VaultScope>) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let entry = records
            .iter_mut()
            .find(|(_, r)| r.id == record.id)
            .ok_or_else(|| StorageError::NotFound(record.id.clone()))?;
        entry.1 = record.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(_, r)| r.id != id);
        if records.len() == before {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VaultService for MemoryVault {
    async fn status(&self) -> StorageResult<VaultStatus> {
        Ok(*self.status.lock().unwrap())
    }

    async fn login(&self, _: &str, password: &SecretString, _: Option<&str>) -> StorageResult<()> {
        self.check_password(password)
    }

    async fn unlock(&self, password: &SecretString) -> StorageResult<()> {
        self.check_password(password)
    }

    async fn list_organizations(&self) -> StorageResult<Vec<Organization>> {
        Ok(self.organizations.clone())
    }

    async fn list_collections(&self, organization_id: &str) -> StorageResult<Vec<Collection>> {
        self.collections
            .get(organization_id)
            .cloned()
            .ok_or_else(|| StorageError::CommandFailed(format!("access denied to {organization_id}")))
    }
}

/// Factory over a real local file and an in-memory vault
pub struct TestBackends {
    pub connections_path: PathBuf,
    pub secrets: Option<Arc<MemorySecrets>>,
    pub vault: Arc<MemoryVault>,
}

impl BackendFactory for TestBackends {
    fn local(&self) -> Arc<dyn ConnectionStore> {
        let store = LocalStore::new(&self.connections_path);
        match &self.secrets {
            Some(secrets) => Arc::new(store.with_secret_store(Arc::clone(secrets) as Arc<dyn SecretStore>, SERVICE)),
            None => Arc::new(store),
        }
    }

    fn vault(&self, _: &VaultSettings) -> Arc<dyn VaultService> {
        Arc::clone(&self.vault) as Arc<dyn VaultService>
    }
}

/// Controller wired to a task runner; tasks run inline to completion
pub struct Harness {
    pub controller: StateController,
    pub runner: TaskRunner,
    pub spawner: Arc<RecordingSpawner>,
    /// Effects other than `Run`, in order
    pub effects: Vec<Effect>,
}

pub struct HarnessBuilder {
    pub dir: PathBuf,
    pub environment: LaunchEnvironment,
    pub tools: Vec<&'static str>,
    pub secrets: Option<Arc<MemorySecrets>>,
    pub vault: Arc<MemoryVault>,
    pub vault_email: Option<String>,
}

impl HarnessBuilder {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            environment: LaunchEnvironment::new(Platform::Unix, false),
            tools: Vec::new(),
            secrets: None,
            vault: Arc::new(MemoryVault::new(VaultStatus::default())),
            vault_email: None,
        }
    }

    pub fn connections_path(&self) -> PathBuf {
        self.dir.join("connections.toml")
    }

    pub fn key_dir(&self) -> PathBuf {
        self.dir.join("xterm_keys")
    }

    pub fn build(self) -> Harness {
        let spawner = Arc::new(RecordingSpawner::default());
        let secrets = self.secrets.clone().map(|s| s as Arc<dyn SecretStore>);
        let resolver = CredentialResolver::new(secrets, SERVICE, KeyMaterializer::new(self.key_dir()));
        let launcher = SessionLauncher::new(
            self.environment,
            FakeProbe::with(&self.tools),
            Arc::clone(&spawner) as Arc<dyn ProcessSpawner>,
        );
        let config = ControllerConfig {
            environment: self.environment,
            default_mode: DefaultLaunchMode::Auto,
            vault: VaultSettings {
                email: self.vault_email.clone(),
                ..VaultSettings::default()
            },
            cleanup_keys: true,
        };
        let factory = TestBackends {
            connections_path: self.connections_path(),
            secrets: self.secrets,
            vault: self.vault,
        };
        Harness {
            controller: StateController::new(config, Arc::new(factory)),
            runner: TaskRunner::new(resolver, launcher),
            spawner,
            effects: Vec::new(),
        }
    }
}

impl Harness {
    /// Handles `event` and every reply it causes
    pub async fn send(&mut self, event: AppEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.controller.handle(event) {
                match effect {
                    Effect::Run(Task { token, kind }) => {
                        let reply = self.runner.run(kind).await;
                        queue.push_back(AppEvent::Completed { token, reply });
                    }
                    other => self.effects.push(other),
                }
            }
        }
    }

    pub async fn press(&mut self, key: Key) {
        self.send(AppEvent::Input(key)).await;
    }

    pub async fn type_text(&mut self, text: &str) {
        self.press(Key::Paste(text.to_string())).await;
    }

    pub fn connection_names(&self) -> Vec<String> {
        self.controller
            .connections()
            .items()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    /// Removes and returns the recorded non-`Run` effects
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }
}
