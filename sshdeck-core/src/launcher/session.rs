//! Building and starting sessions

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

use crate::error::{LaunchError, LaunchResult};
use crate::logging::span_names;
use crate::secret::{ResolvedAuth, ResolvedConnection};

use super::command::{cmd_arg, console_title, push_plink_args, shell_command, ssh_args};
use super::tools::{ProcessSpawner, SpawnCommand, ToolProbe};
use super::{LaunchEnvironment, LaunchMode, LaunchStrategy, PLINK, SSHPASS, TMUX};

/// `sshpass -e` reads the password from this variable
const SSHPASS_ENV: &str = "SSHPASS";

/// Prefix of the tmux paste buffer carrying a window's password
const PASSWORD_BUFFER_PREFIX: &str = "sshdeck-";

/// An SSH client to run in the current terminal
#[derive(Debug, Clone)]
pub struct EmbeddedSession {
    /// Command to run with inherited stdio
    pub command: SpawnCommand,
    /// `user@host:port - name`
    pub title: String,
    /// Key file written for this session, removed when it ends
    pub materialized_key: Option<PathBuf>,
}

/// What a launch will do
#[derive(Debug, Clone)]
pub enum PlannedAction {
    /// Hand the terminal to an SSH client
    Embedded(EmbeddedSession),
    /// Run a wrapper that opens a window, then return
    External(SpawnCommand),
}

/// A fully built launch
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Selected strategy
    pub strategy: LaunchStrategy,
    /// Command to run
    pub action: PlannedAction,
    /// Downgrades applied while building
    pub warnings: Vec<String>,
    /// Window or session title
    pub title: String,
}

/// Result of [`SessionLauncher::launch`]
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// The caller has to run the session in its terminal
    Embedded {
        /// Session to run
        session: EmbeddedSession,
        /// Downgrades applied
        warnings: Vec<String>,
    },
    /// An external window was opened
    Launched {
        /// Window title
        title: String,
        /// Strategy used
        strategy: LaunchStrategy,
        /// Downgrades applied
        warnings: Vec<String>,
    },
}

/// Turns a resolved connection into a running session
#[derive(Clone)]
pub struct SessionLauncher {
    environment: LaunchEnvironment,
    probe: Arc<dyn ToolProbe>,
    spawner: Arc<dyn ProcessSpawner>,
    ssh_binary: String,
}

impl std::fmt::Debug for SessionLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLauncher")
            .field("environment", &self.environment)
            .field("ssh_binary", &self.ssh_binary)
            .finish_non_exhaustive()
    }
}

impl SessionLauncher {
    /// Creates a launcher using `ssh` from `PATH`
    #[must_use]
    pub fn new(
        environment: LaunchEnvironment,
        probe: Arc<dyn ToolProbe>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        Self {
            environment,
            probe,
            spawner,
            ssh_binary: "ssh".to_string(),
        }
    }

    /// Uses a different OpenSSH client binary
    #[must_use]
    pub fn with_ssh_binary(mut self, binary: impl Into<String>) -> Self {
        self.ssh_binary = binary.into();
        self
    }

    /// Environment the launcher was configured with
    #[must_use]
    pub const fn environment(&self) -> &LaunchEnvironment {
        &self.environment
    }

    fn has_tool(&self, tool: &str) -> bool {
        self.probe.find(tool).is_some()
    }

    /// Builds the command for `resolved` in `mode` without running it
    ///
    /// # Errors
    /// Returns `LaunchError::NoMultiplexer` when tmux disappeared since
    /// startup and `LaunchError::Quote` when the window command cannot be
    /// quoted for the shell or `cmd`.
    pub fn plan(&self, resolved: &ResolvedConnection, mode: LaunchMode) -> LaunchResult<LaunchPlan> {
        let (strategy, downgrade) = LaunchStrategy::select(&self.environment, mode);
        let mut warnings: Vec<String> = downgrade.into_iter().collect();
        let title = resolved.record.window_title();

        let action = match strategy {
            LaunchStrategy::Embedded => PlannedAction::Embedded(EmbeddedSession {
                command: self.embedded_command(resolved, &mut warnings),
                title: title.clone(),
                materialized_key: resolved.auth.materialized_key().map(PathBuf::from),
            }),
            LaunchStrategy::MultiplexerWindow => {
                PlannedAction::External(self.tmux_command(resolved, &title, &mut warnings)?)
            }
            LaunchStrategy::WindowsConsole => {
                PlannedAction::External(self.console_command(resolved, &title, &mut warnings)?)
            }
        };

        Ok(LaunchPlan {
            strategy,
            action,
            warnings,
            title,
        })
    }

    /// Plans and, for external windows, starts the session
    ///
    /// Embedded sessions are returned to the caller, which owns the terminal.
    ///
    /// # Errors
    /// Returns the planning error or the spawn failure. Nothing is retried.
    pub async fn launch(
        &self,
        resolved: &ResolvedConnection,
        mode: LaunchMode,
    ) -> LaunchResult<LaunchOutcome> {
        let span = info_span!(span_names::SESSION_LAUNCH, connection_id = %resolved.record.id);
        self.launch_inner(resolved, mode).instrument(span).await
    }

    async fn launch_inner(
        &self,
        resolved: &ResolvedConnection,
        mode: LaunchMode,
    ) -> LaunchResult<LaunchOutcome> {
        let plan = self.plan(resolved, mode)?;
        for warning in &plan.warnings {
            warn!(%warning, "Launch degraded");
        }

        match plan.action {
            PlannedAction::Embedded(session) => Ok(LaunchOutcome::Embedded {
                session,
                warnings: plan.warnings,
            }),
            PlannedAction::External(command) => {
                self.spawner.run(&command).await?;
                info!(strategy = ?plan.strategy, "Opened session window");
                Ok(LaunchOutcome::Launched {
                    title: plan.title,
                    strategy: plan.strategy,
                    warnings: plan.warnings,
                })
            }
        }
    }

    fn embedded_command(
        &self,
        resolved: &ResolvedConnection,
        warnings: &mut Vec<String>,
    ) -> SpawnCommand {
        let args = ssh_args(&resolved.record, resolved.auth.key_path());
        match &resolved.auth {
            ResolvedAuth::Password(password) if self.has_tool(SSHPASS) => {
                SpawnCommand::new(SSHPASS, vec!["-e".to_string(), self.ssh_binary.clone()])
                    .args(args)
                    .with_env(SSHPASS_ENV, password.clone())
            }
            ResolvedAuth::Password(_) => {
                warnings.push(missing_helper(SSHPASS, "ssh will ask for the password"));
                SpawnCommand::new(&self.ssh_binary, args)
            }
            ResolvedAuth::KeyFile { .. } | ResolvedAuth::ClientDefault => {
                SpawnCommand::new(&self.ssh_binary, args)
            }
        }
    }

    /// `tmux new-window` running the SSH client
    ///
    /// A password is loaded into a paste buffer from stdin in the same tmux
    /// invocation. The window reads and deletes the buffer before starting
    /// `sshpass`, so the password never shows up in an argument list.
    fn tmux_command(
        &self,
        resolved: &ResolvedConnection,
        title: &str,
        warnings: &mut Vec<String>,
    ) -> LaunchResult<SpawnCommand> {
        if !self.has_tool(TMUX) {
            return Err(LaunchError::NoMultiplexer);
        }

        let mut cmd = SpawnCommand::new(TMUX, Vec::new());
        let mut script = String::new();
        let mut argv = Vec::new();
        if let ResolvedAuth::Password(password) = &resolved.auth {
            if self.has_tool(SSHPASS) {
                let buffer = format!("{PASSWORD_BUFFER_PREFIX}{}", resolved.record.id);
                cmd = cmd
                    .args(["load-buffer", "-b", buffer.as_str(), "-", ";"])
                    .with_stdin(password.clone());
                script = format!(
                    "{SSHPASS_ENV}=$({}) && {} && export {SSHPASS_ENV} && exec ",
                    shell_command(&[TMUX, "show-buffer", "-b", buffer.as_str()])?,
                    shell_command(&[TMUX, "delete-buffer", "-b", buffer.as_str()])?,
                );
                argv.extend([SSHPASS.to_string(), "-e".to_string()]);
            } else {
                warnings.push(missing_helper(SSHPASS, "the window will ask for the password"));
            }
        }
        argv.push(self.ssh_binary.clone());
        argv.extend(ssh_args(&resolved.record, resolved.auth.key_path()));
        script.push_str(&shell_command(&argv)?);

        Ok(cmd
            .args(["new-window", "-n", title])
            .arg(script))
    }

    fn console_command(
        &self,
        resolved: &ResolvedConnection,
        title: &str,
        warnings: &mut Vec<String>,
    ) -> LaunchResult<SpawnCommand> {
        let key = resolved.auth.key_path();
        let client = match &resolved.auth {
            ResolvedAuth::Password(password) if self.has_tool(PLINK) => {
                push_plink_args(SpawnCommand::new(PLINK, Vec::new()), &resolved.record, password, key)
            }
            ResolvedAuth::Password(_) => {
                warnings.push(missing_helper(PLINK, "the console will ask for the password"));
                SpawnCommand::new(&self.ssh_binary, ssh_args(&resolved.record, key))
            }
            ResolvedAuth::KeyFile { .. } | ResolvedAuth::ClientDefault => {
                SpawnCommand::new(&self.ssh_binary, ssh_args(&resolved.record, key))
            }
        };

        // cmd parses the whole line once more before start runs the client
        Ok(client.try_map_args(cmd_arg)?.wrapped(
            "cmd",
            vec!["/C".to_string(), "start".to_string(), console_title(title)],
        ))
    }
}

fn missing_helper(tool: &str, consequence: &str) -> String {
    format!("{tool} not found; {consequence}")
}
