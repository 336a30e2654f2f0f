//! Backend selection and the external reload command

use crate::error::{Result, WatchError};
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use tracing::info;

/// Default command run by the reload backend
pub const DEFAULT_RELOAD_COMMAND: &str = "air";

/// Watching mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Native file system events, debounced and dispatched to handlers
    Native,
    /// Hand the directory to an external auto-reload process
    Reload,
}

impl FromStr for Backend {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "notify" | "watchdog" => Ok(Backend::Native),
            "reload" | "air" => Ok(Backend::Reload),
            other => Err(WatchError::config(format!(
                "unknown backend '{other}' (expected 'native' or 'reload')"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Native => f.write_str("native"),
            Backend::Reload => f.write_str("reload"),
        }
    }
}

/// Run the reload command in `dir` and wait for it
///
/// The command goes through the platform shell. A non-zero exit is
/// [`WatchError::ExternalProcess`].
pub fn run_reload(command: &str, dir: &Path) -> Result<()> {
    info!("running reload command `{}` in {}", command, dir.display());

    let status = shell(command).current_dir(dir).status()?;
    if !status.success() {
        return Err(WatchError::ExternalProcess {
            command: command.to_string(),
            status,
        });
    }

    Ok(())
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
