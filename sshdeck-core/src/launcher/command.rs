//! Argument vectors for the SSH clients

use std::path::Path;

use secrecy::SecretString;

use crate::error::{LaunchError, LaunchResult};
use crate::models::ConnectionRecord;

use super::SpawnCommand;

/// OpenSSH arguments: `[-i key] [-p port] user@host`
#[must_use]
pub fn ssh_args(record: &ConnectionRecord, key: Option<&Path>) -> Vec<String> {
    let mut args = Vec::with_capacity(5);
    if let Some(key) = key {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    if let Some(port) = record.explicit_port() {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    args.push(record.destination());
    args
}

/// Appends plink arguments: `-ssh user@host -pw <pw> [-P port] [-i key]`
#[must_use]
pub fn push_plink_args(
    cmd: SpawnCommand,
    record: &ConnectionRecord,
    password: &SecretString,
    key: Option<&Path>,
) -> SpawnCommand {
    let mut cmd = cmd
        .args(["-ssh".to_string(), record.destination(), "-pw".to_string()])
        .secret_arg(password.clone());
    if let Some(port) = record.explicit_port() {
        cmd = cmd.args(["-P".to_string(), port.to_string()]);
    }
    if let Some(key) = key {
        cmd = cmd.args(["-i".to_string(), key.display().to_string()]);
    }
    cmd
}

/// Joins `argv` into one POSIX shell command string
///
/// # Errors
/// Returns `LaunchError::Quote` for arguments containing a NUL byte.
pub fn shell_command<S: AsRef<str>>(argv: &[S]) -> LaunchResult<String> {
    shlex::try_join(argv.iter().map(AsRef::as_ref))
        .map_err(|e| LaunchError::Quote(e.to_string()))
}

/// Characters `cmd.exe` treats as operators outside quotes
const CMD_OPERATORS: [char; 7] = ['^', '&', '|', '<', '>', '(', ')'];

/// Escapes one argument of a `cmd /C` command line
///
/// Operators are caret-escaped. Arguments with whitespace are quoted by the
/// process API, where operators are already literal, so they are kept. `"`
/// and `%` stay special in both forms and are rejected along with line
/// breaks.
///
/// # Errors
/// Returns `LaunchError::Quote` for arguments `cmd` cannot take literally.
pub fn cmd_arg(arg: &str) -> LaunchResult<String> {
    if let Some(c) = arg.chars().find(|c| matches!(c, '"' | '%' | '\r' | '\n' | '\0')) {
        return Err(LaunchError::Quote(format!(
            "{c:?} cannot be passed through cmd"
        )));
    }
    if arg.is_empty() || arg.contains([' ', '\t']) {
        return Ok(arg.to_string());
    }
    let mut escaped = String::with_capacity(arg.len() * 2);
    for c in arg.chars() {
        if CMD_OPERATORS.contains(&c) {
            escaped.push('^');
        }
        escaped.push(c);
    }
    Ok(escaped)
}

/// Window title for `start`
///
/// `start` reads its first quoted argument as the title. Titles always
/// contain spaces, so the process API quotes them.
#[must_use]
pub fn console_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if matches!(c, '"' | '%') || c.is_control() { '_' } else { c })
        .collect()
}
