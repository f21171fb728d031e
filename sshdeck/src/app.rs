//! Event loop: terminal input and task replies into the controller,
//! effects out to the runtime and the terminal

use std::sync::Arc;
use std::time::Duration;

use crossterm::event;
use sshdeck_core::app::{AppEvent, ControllerConfig, Effect, StateController, TaskRunner};
use sshdeck_core::config::{AppSettings, ConfigManager};
use sshdeck_core::launcher::{
    EmbeddedSession, LaunchEnvironment, SessionLauncher, SystemSpawner, WhichProbe,
};
use sshdeck_core::logging::span_names;
use sshdeck_core::secret::{CredentialResolver, KeyMaterializer, KeyringStore, SecretStore};
use sshdeck_core::storage::SystemBackends;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, info_span, warn};

use crate::error::AppError;
use crate::input;
use crate::tui::Tui;
use crate::ui;

/// How long one input poll blocks before task replies are drained
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Whether the loop keeps running after an effect
enum Flow {
    Continue,
    Quit,
}

/// Everything the event loop owns
pub struct App {
    controller: StateController,
    runner: TaskRunner,
    config: ConfigManager,
    settings: AppSettings,
    events: UnboundedSender<AppEvent>,
    queue: UnboundedReceiver<AppEvent>,
}

impl App {
    /// Wires the controller to the system backends, keyring and launcher
    pub fn new(config: ConfigManager, settings: AppSettings) -> Self {
        let probe = Arc::new(WhichProbe);
        let environment = LaunchEnvironment::detect(probe.as_ref());
        info!(?environment, "Detected launch environment");

        let secrets: Option<Arc<dyn SecretStore>> = settings
            .secrets
            .use_keyring
            .then(|| Arc::new(KeyringStore::new()) as Arc<dyn SecretStore>);

        let mut backends = SystemBackends::new(config.connections_path());
        if let Some(store) = &secrets {
            backends = backends.with_secret_store(Arc::clone(store), settings.secrets.service.clone());
        }

        let resolver = CredentialResolver::new(
            secrets,
            settings.secrets.service.clone(),
            KeyMaterializer::new(config.key_dir(&settings)),
        );
        let launcher = SessionLauncher::new(environment, probe, Arc::new(SystemSpawner))
            .with_ssh_binary(settings.launch.ssh_binary.clone());

        let controller = StateController::new(
            ControllerConfig::from_settings(&settings, environment),
            Arc::new(backends),
        );
        let (events, queue) = mpsc::unbounded_channel();

        Self {
            controller,
            runner: TaskRunner::new(resolver, launcher),
            config,
            settings,
            events,
            queue,
        }
    }

    /// Runs until the controller asks to quit
    pub fn run(&mut self, tui: &mut Tui) -> Result<(), AppError> {
        loop {
            tui.draw(|frame| ui::draw(frame, &self.controller))
                .map_err(AppError::Terminal)?;

            if event::poll(POLL_INTERVAL).map_err(AppError::Terminal)?
                && let Some(key) = input::translate(event::read().map_err(AppError::Terminal)?)
            {
                self.push(AppEvent::Input(key));
            }

            while let Ok(event) = self.queue.try_recv() {
                for effect in self.controller.handle(event) {
                    if let Flow::Quit = self.apply(effect, tui)? {
                        info!("Quit requested");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn push(&self, event: AppEvent) {
        // the receiver lives in `self`, so sending cannot fail while we run
        self.events.send(event).ok();
    }

    fn apply(&mut self, effect: Effect, tui: &mut Tui) -> Result<Flow, AppError> {
        match effect {
            Effect::Run(task) => self.runner.spawn(task, self.events.clone()),
            Effect::EnterSession(session) => {
                let ended = run_session(&session, tui)?;
                self.push(ended);
            }
            Effect::RemoveKeyFile(path) => self.runner.resolver().materializer().remove(&path),
            Effect::PersistVaultSettings(vault) => {
                self.settings.vault = vault;
                if let Err(e) = self.config.save_settings(&self.settings) {
                    warn!(error = %e, "Failed to save vault settings");
                }
            }
            Effect::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

/// Suspends the TUI, runs the session in this terminal and resumes
fn run_session(session: &EmbeddedSession, tui: &mut Tui) -> Result<AppEvent, AppError> {
    let span = info_span!(span_names::SESSION_EMBEDDED, title = %session.title);
    let _guard = span.enter();

    tui.suspend().map_err(AppError::Terminal)?;
    info!(program = session.command.program(), args = ?session.command.display_args(), "Starting session");
    let status = session.command.to_std().status();
    tui.resume().map_err(AppError::Terminal)?;

    Ok(match status {
        Ok(status) => {
            info!(code = ?status.code(), "Session ended");
            AppEvent::SessionEnded {
                exit_code: status.code(),
                error: None,
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to start session");
            AppEvent::SessionEnded {
                exit_code: None,
                error: Some(format!("Failed to start {}: {e}", session.command.program())),
            }
        }
    })
}
