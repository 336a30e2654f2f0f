//! Debounced directory watching
//!
//! This crate observes one directory (non-recursive) and forwards file
//! system changes to caller-registered handlers:
//! - One shared debounce window across all event kinds (default 1s)
//! - Per-kind handlers or a single catch-all
//! - Native notify backend or an external reload command
//! - Pluggable raw event sources

pub mod backend;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod handlers;
pub mod session;
pub mod source;
pub mod watcher;

// Re-exports
pub use backend::Backend;
pub use config::WatchConfig;
pub use debounce::{DebounceGate, DEFAULT_DEBOUNCE};
pub use error::{Result, WatchError};
pub use event::{EventKind, RenamePairer, WatchEvent, RENAME_PAIR_WINDOW};
pub use handlers::{Handler, HandlerSet};
pub use session::{Dispatch, EventSink, SessionStats, WatchSession};
pub use source::{ChannelSource, EventSource, NotifySource};
pub use watcher::{WatchState, Watcher, WatcherBuilder};
