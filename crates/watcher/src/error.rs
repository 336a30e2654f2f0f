//! Error types for the debounced watcher

use crate::event::EventKind;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors from watcher construction, start-up and dispatch
#[derive(Error, Debug)]
pub enum WatchError {
    /// Bad construction input or unknown backend selector
    #[error("invalid watch configuration: {reason}")]
    Configuration { reason: String },

    /// The reload backend's command exited with a non-zero status
    #[error("reload command `{command}` failed with {status}")]
    ExternalProcess { command: String, status: ExitStatus },

    /// An event reached dispatch but no handler covers its kind
    #[error("no handler registered for {kind} events")]
    HandlerUnavailable { kind: EventKind },

    /// A handler returned an error
    #[error("{kind} handler failed for {path}: {source}")]
    HandlerFailed {
        kind: EventKind,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("failed to initialize event source: {reason}")]
    InitFailed { reason: String },

    #[error("cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("already watching {path}")]
    AlreadyWatching { path: PathBuf },

    /// `stop` was called from inside one of the session's own handlers
    #[error("cannot stop watching {path} from one of its handlers")]
    StopFromHandler { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WatchError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        WatchError::Configuration {
            reason: reason.into(),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
