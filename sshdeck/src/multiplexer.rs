//! Moving the process into a tmux session at startup

use sshdeck_core::launcher::{TMUX, TMUX_ENV};
use sshdeck_core::logging::LOG_FILE_ENV;

use crate::error::AppError;

/// Re-executes this binary inside a new tmux session
///
/// Does nothing when already inside tmux, when tmux is not installed, or
/// on platforms without tmux. On success this never returns.
pub fn reexec_in_tmux() -> Result<(), AppError> {
    if std::env::var_os(TMUX_ENV).is_some_and(|v| !v.is_empty()) {
        return Ok(());
    }
    let Ok(tmux) = which::which(TMUX) else {
        tracing::info!("tmux not found, running without a multiplexer");
        return Ok(());
    };
    let exe = std::env::current_exe().map_err(AppError::Multiplexer)?;
    exec(tmux_args(&exe.to_string_lossy(), std::env::var(LOG_FILE_ENV).ok()), &tmux)
}

/// `new-session` arguments running `exe` as the session's only window
///
/// tmux hands a single command argument to the shell, so `exe` is quoted.
/// The log file override is passed explicitly because a running tmux
/// server does not inherit the client's environment.
fn tmux_args(exe: &str, log_file: Option<String>) -> Vec<String> {
    let mut args = vec!["new-session".to_string()];
    if let Some(log_file) = log_file.filter(|f| !f.is_empty()) {
        args.push("-e".to_string());
        args.push(format!("{LOG_FILE_ENV}={log_file}"));
    }
    args.push("--".to_string());
    args.push(shlex::try_quote(exe).map_or_else(|_| exe.to_string(), |q| q.into_owned()));
    args
}

#[cfg(unix)]
fn exec(args: Vec<String>, tmux: &std::path::Path) -> Result<(), AppError> {
    use std::os::unix::process::CommandExt;

    tracing::info!(tmux = %tmux.display(), "Re-executing inside tmux");
    let err = std::process::Command::new(tmux).args(args).exec();
    Err(AppError::Multiplexer(err))
}

#[cfg(not(unix))]
fn exec(_args: Vec<String>, _tmux: &std::path::Path) -> Result<(), AppError> {
    Ok(())
}
