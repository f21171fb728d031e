//! Runs controller tasks on the tokio runtime

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::launcher::{LaunchMode, LaunchOutcome, SessionLauncher};
use crate::models::ConnectionRecord;
use crate::secret::{CredentialResolver, Resolution};

use super::event::{AppEvent, LaunchReply, Task, TaskKind, TaskReply};

/// Executes [`Task`]s and reports their replies
#[derive(Debug, Clone)]
pub struct TaskRunner {
    resolver: CredentialResolver,
    launcher: SessionLauncher,
}

impl TaskRunner {
    /// Creates a runner
    #[must_use]
    pub const fn new(resolver: CredentialResolver, launcher: SessionLauncher) -> Self {
        Self { resolver, launcher }
    }

    /// Credential resolver, also used to remove materialized keys
    #[must_use]
    pub const fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// Session launcher
    #[must_use]
    pub const fn launcher(&self) -> &SessionLauncher {
        &self.launcher
    }

    /// Runs a task to completion
    pub async fn run(&self, kind: TaskKind) -> TaskReply {
        match kind {
            TaskKind::Storage { handle, op } => TaskReply::Storage(handle.execute(op).await),
            TaskKind::Launch { record, mode } => TaskReply::Launch(self.launch(record, mode).await),
        }
    }

    /// Resolves credentials and launches one connection
    ///
    /// A key materialized for a launch that then fails is removed again.
    pub async fn launch(&self, record: ConnectionRecord, mode: LaunchMode) -> LaunchReply {
        let resolved = match self.resolver.resolve(record).await {
            Ok(Resolution::Ready(resolved)) => resolved,
            Ok(Resolution::PasswordRequired { record, reason }) => {
                return LaunchReply::PasswordRequired {
                    record,
                    mode,
                    reason,
                };
            }
            Err(e) => return LaunchReply::Failed(e),
        };

        match self.launcher.launch(&resolved, mode).await {
            Ok(LaunchOutcome::Embedded { session, warnings }) => {
                LaunchReply::Embedded { session, warnings }
            }
            Ok(LaunchOutcome::Launched {
                title, warnings, ..
            }) => LaunchReply::Launched { title, warnings },
            Err(e) => {
                if let Some(path) = resolved.auth.materialized_key() {
                    self.resolver.materializer().remove(path);
                }
                LaunchReply::Failed(e)
            }
        }
    }

    /// Runs `task` in the background and sends its reply to `events`
    pub fn spawn(&self, task: Task, events: UnboundedSender<AppEvent>) {
        let runner = self.clone();
        tokio::spawn(async move {
            let Task { token, kind } = task;
            let reply = runner.run(kind).await;
            if events.send(AppEvent::Completed { token, reply }).is_err() {
                warn!(token, "Event queue closed, dropping reply");
            } else {
                debug!(token, "Task finished");
            }
        });
    }
}
