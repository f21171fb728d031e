//! Tool lookup and process spawning seams

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{LaunchError, LaunchResult};

/// Looks up executables by name
pub trait ToolProbe: Send + Sync {
    /// Full path of `tool`, or `None` when it is not installed
    fn find(&self, tool: &str) -> Option<PathBuf>;
}

/// [`ToolProbe`] searching `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct WhichProbe;

impl ToolProbe for WhichProbe {
    fn find(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// A program invocation that may carry secrets
///
/// Secret arguments, environment values and stdin input are kept as
/// [`SecretString`] and never appear in `Debug` output or
/// [`Self::display_args`].
#[derive(Clone)]
pub struct SpawnCommand {
    program: String,
    args: Vec<Arg>,
    env: Vec<(String, SecretString)>,
    stdin: Option<SecretString>,
}

#[derive(Clone)]
enum Arg {
    Plain(String),
    Secret(SecretString),
}

impl Arg {
    fn expose(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Secret(s) => s.expose_secret(),
        }
    }
}

impl std::fmt::Debug for SpawnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("SpawnCommand")
            .field("program", &self.program)
            .field("args", &self.display_args())
            .field("env", &env)
            .field("stdin", &self.stdin.is_some())
            .finish()
    }
}

impl SpawnCommand {
    /// Creates a command with plain arguments
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Arg::Plain).collect(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// Program name or path
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Appends a plain argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    /// Appends plain arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    /// Appends an argument that must not be shown
    #[must_use]
    pub fn secret_arg(mut self, arg: SecretString) -> Self {
        self.args.push(Arg::Secret(arg));
        self
    }

    /// Adds an environment variable
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: SecretString) -> Self {
        self.env.push((key.into(), value));
        self
    }

    /// Feeds `input` to the process on stdin
    #[must_use]
    pub fn with_stdin(mut self, input: SecretString) -> Self {
        self.stdin = Some(input);
        self
    }

    /// Input written to stdin, if any
    #[must_use]
    pub const fn stdin(&self) -> Option<&SecretString> {
        self.stdin.as_ref()
    }

    /// Escapes every argument and the program name with `escape`
    ///
    /// Secret arguments stay secret.
    ///
    /// # Errors
    /// Returns the first error of `escape`.
    pub fn try_map_args<F>(self, escape: F) -> LaunchResult<Self>
    where
        F: Fn(&str) -> LaunchResult<String>,
    {
        let args = self
            .args
            .iter()
            .map(|arg| {
                Ok(match arg {
                    Arg::Plain(s) => Arg::Plain(escape(s)?),
                    Arg::Secret(s) => Arg::Secret(SecretString::from(escape(s.expose_secret())?)),
                })
            })
            .collect::<LaunchResult<_>>()?;
        Ok(Self {
            program: escape(&self.program)?,
            args,
            ..self
        })
    }

    /// Runs this command through `program`, after `leading` arguments
    #[must_use]
    pub fn wrapped(self, program: impl Into<String>, leading: Vec<String>) -> Self {
        let mut args: Vec<Arg> = leading.into_iter().map(Arg::Plain).collect();
        args.push(Arg::Plain(self.program));
        args.extend(self.args);
        Self {
            program: program.into(),
            args,
            env: self.env,
            stdin: self.stdin,
        }
    }

    /// Names of the extra environment variables
    pub fn env_keys(&self) -> impl Iterator<Item = &str> {
        self.env.iter().map(|(k, _)| k.as_str())
    }

    /// Value of an extra environment variable
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&SecretString> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Arguments with secrets replaced by `***`
    #[must_use]
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| match a {
                Arg::Plain(s) => s.clone(),
                Arg::Secret(_) => "***".to_string(),
            })
            .collect()
    }

    /// Arguments as passed to the process
    #[must_use]
    pub fn exposed_args(&self) -> Vec<&str> {
        self.args.iter().map(Arg::expose).collect()
    }

    /// Converts into a std command with the environment applied
    #[must_use]
    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(self.args.iter().map(Arg::expose));
        for (key, value) in &self.env {
            cmd.env(key, value.expose_secret());
        }
        cmd
    }
}

/// Runs wrapper processes that open external windows
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Runs `command` to completion
    async fn run(&self, command: &SpawnCommand) -> LaunchResult<()>;
}

/// [`ProcessSpawner`] using real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

#[async_trait]
impl ProcessSpawner for SystemSpawner {
    async fn run(&self, command: &SpawnCommand) -> LaunchResult<()> {
        let mut cmd = Command::from(command.to_std());
        cmd.stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        debug!(program = %command.program, args = ?command.display_args(), "Spawning");
        let spawn_error = |source: std::io::Error| LaunchError::Spawn {
            program: command.program.clone(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_error)?;
        if let (Some(input), Some(mut pipe)) = (&command.stdin, child.stdin.take()) {
            pipe.write_all(input.expose_secret().as_bytes())
                .await
                .map_err(spawn_error)?;
            // EOF for the reader
            drop(pipe);
        }
        let output = child.wait_with_output().await.map_err(spawn_error)?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(LaunchError::Failed {
            program: command.program.clone(),
            message: if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            },
        })
    }
}
