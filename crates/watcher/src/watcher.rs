//! Session controller: construction, start and stop

use crate::backend::{run_reload, Backend, DEFAULT_RELOAD_COMMAND};
use crate::config::WatchConfig;
use crate::debounce::DEFAULT_DEBOUNCE;
use crate::error::{Result, WatchError};
use crate::event::WatchEvent;
use crate::handlers::{Handler, HandlerSet};
use crate::session::{EventSink, WatchSession};
use crate::source::{EventSource, NotifySource};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Not started yet, or stopped
    Stopped,
    /// Keep-alive thread running, source delivering events
    Watching,
}

/// Background half of a watching session
struct Running {
    shutdown: Sender<()>,
    keep_alive: JoinHandle<()>,
}

/// Debounced directory watcher
///
/// Raw events from the source pass through a single session-wide debounce
/// gate; events that pass are dispatched to the handler registered for
/// their kind. Dropping a running watcher ends its session: the keep-alive
/// thread wakes on the closed shutdown channel and releases the source.
pub struct Watcher {
    session: Arc<WatchSession>,
    backend: String,
    reload_command: String,
    running: Mutex<Option<Running>>,
}

impl Watcher {
    pub fn builder(path: impl Into<PathBuf>) -> WatcherBuilder {
        WatcherBuilder::new(path)
    }

    pub fn path(&self) -> &Path {
        self.session.path()
    }

    pub fn session(&self) -> &Arc<WatchSession> {
        &self.session
    }

    /// Backend selector as given at construction
    pub fn backend_selector(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> WatchState {
        match *self.running.lock() {
            Some(_) => WatchState::Watching,
            None => WatchState::Stopped,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.state() == WatchState::Watching
    }

    /// Start watching with the native notify source
    ///
    /// Returns as soon as observation is set up. With the reload backend this
    /// instead blocks until the reload command exits.
    pub fn start(&self) -> Result<()> {
        self.start_with(NotifySource::new())
    }

    /// Start watching with a caller-provided raw event source
    ///
    /// The backend selector is checked first; an unknown selector fails
    /// before the source is touched or any thread is spawned.
    pub fn start_with<S>(&self, source: S) -> Result<()>
    where
        S: EventSource + 'static,
    {
        match self.backend.parse::<Backend>()? {
            Backend::Native => self.spawn(source),
            Backend::Reload => run_reload(&self.reload_command, self.path()),
        }
    }

    fn spawn<S>(&self, mut source: S) -> Result<()>
    where
        S: EventSource + 'static,
    {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(WatchError::AlreadyWatching {
                path: self.path().to_path_buf(),
            });
        }

        self.session.reopen();
        // path errors surface here, on the caller's thread
        source.watch(self.path(), EventSink::new(Arc::clone(&self.session)))?;

        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let path = self.path().to_path_buf();
        let keep_alive = std::thread::Builder::new()
            .name(format!("watch:{}", path.display()))
            .spawn(move || {
                // idle until stop() or the Watcher is dropped
                let _ = shutdown_rx.recv();
                drop(source);
                debug!("keep-alive for {} exited", path.display());
            })?;

        info!(
            "watching {} (debounce {:?})",
            self.path().display(),
            self.session.debounce_window()
        );
        *running = Some(Running {
            shutdown,
            keep_alive,
        });
        Ok(())
    }

    /// Stop watching and release the source
    ///
    /// Waits for a handler that is running on another thread; once this
    /// returns, no handler of this watcher runs again until the next start.
    /// No-op when already stopped.
    ///
    /// A handler of this watcher cannot stop it: the call returns
    /// [`WatchError::StopFromHandler`] and the session keeps watching.
    pub fn stop(&self) -> Result<()> {
        if self.session.in_handler() {
            return Err(WatchError::StopFromHandler {
                path: self.path().to_path_buf(),
            });
        }
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };

        self.session.close();
        let _ = running.shutdown.send(());
        if running.keep_alive.join().is_err() {
            warn!("keep-alive thread for {} panicked", self.path().display());
        }

        info!("stopped watching {}", self.path().display());
        Ok(())
    }
}

/// Builder for [`Watcher`]
pub struct WatcherBuilder {
    path: PathBuf,
    backend: String,
    debounce: Duration,
    reload_command: String,
    on_created: Option<Handler>,
    on_modified: Option<Handler>,
    on_deleted: Option<Handler>,
    on_moved: Option<Handler>,
    on_any: Option<Handler>,
}

impl WatcherBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: "native".to_string(),
            debounce: DEFAULT_DEBOUNCE,
            reload_command: DEFAULT_RELOAD_COMMAND.to_string(),
            on_created: None,
            on_modified: None,
            on_deleted: None,
            on_moved: None,
            on_any: None,
        }
    }

    /// Seed path, backend, window and reload command from a config
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.path.clone())
            .backend(config.backend.clone())
            .debounce(config.debounce())
            .reload_command(config.reload_command.clone())
    }

    /// Backend selector, checked when the watcher starts
    pub fn backend(mut self, selector: impl Into<String>) -> Self {
        self.backend = selector.into();
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn reload_command(mut self, command: impl Into<String>) -> Self {
        self.reload_command = command.into();
        self
    }

    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_created = Some(Arc::new(f));
        self
    }

    pub fn on_modified<F>(mut self, f: F) -> Self
    where
        F: Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_modified = Some(Arc::new(f));
        self
    }

    pub fn on_deleted<F>(mut self, f: F) -> Self
    where
        F: Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_deleted = Some(Arc::new(f));
        self
    }

    pub fn on_moved<F>(mut self, f: F) -> Self
    where
        F: Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_moved = Some(Arc::new(f));
        self
    }

    /// Catch-all handler; overrides every per-kind handler
    pub fn on_any<F>(mut self, f: F) -> Self
    where
        F: Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_any = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Watcher> {
        if self.path.as_os_str().is_empty() {
            return Err(WatchError::config("watch path is empty"));
        }

        let handlers = HandlerSet::resolve(
            self.on_created,
            self.on_modified,
            self.on_deleted,
            self.on_moved,
            self.on_any,
        );
        let missing = handlers.missing();
        if !missing.is_empty() {
            debug!("no handler for {:?} events on {}", missing, self.path.display());
        }

        Ok(Watcher {
            session: Arc::new(WatchSession::new(self.path, self.debounce, handlers)),
            backend: self.backend,
            reload_command: self.reload_command,
            running: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;
    use tempfile::TempDir;

    #[test]
    fn test_empty_path_rejected() {
        let err = Watcher::builder("").build().err().unwrap();
        assert!(matches!(err, WatchError::Configuration { .. }));
    }

    #[test]
    fn test_start_and_stop_transitions() {
        let dir = TempDir::new().unwrap();
        let watcher = Watcher::builder(dir.path())
            .on_any(|_, _| Ok(()))
            .build()
            .unwrap();
        assert_eq!(watcher.state(), WatchState::Stopped);

        let (_tx, source) = ChannelSource::channel();
        watcher.start_with(source).unwrap();
        assert_eq!(watcher.state(), WatchState::Watching);

        let (_tx2, second) = ChannelSource::channel();
        assert!(matches!(
            watcher.start_with(second),
            Err(WatchError::AlreadyWatching { .. })
        ));

        watcher.stop().unwrap();
        assert_eq!(watcher.state(), WatchState::Stopped);
        watcher.stop().unwrap();
    }

    #[test]
    fn test_stop_from_handler_is_refused() {
        let dir = TempDir::new().unwrap();
        let slot: Arc<Mutex<Weak<Watcher>>> = Arc::new(Mutex::new(Weak::new()));
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let slot_in = Arc::clone(&slot);
        let watcher = Arc::new(
            Watcher::builder(dir.path())
                .debounce(Duration::ZERO)
                .on_any(move |_, _| {
                    if let Some(w) = slot_in.lock().upgrade() {
                        result_tx.send(w.stop())?;
                    }
                    Ok(())
                })
                .build()
                .unwrap(),
        );
        *slot.lock() = Arc::downgrade(&watcher);

        let (tx, source) = ChannelSource::channel();
        watcher.start_with(source).unwrap();
        tx.send(WatchEvent::created(dir.path().join("a"))).unwrap();

        let result = result_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(WatchError::StopFromHandler { .. })));
        assert_eq!(watcher.state(), WatchState::Watching);

        watcher.stop().unwrap();
        assert_eq!(watcher.state(), WatchState::Stopped);
    }

    #[test]
    fn test_stop_waits_for_running_handler() {
        let dir = TempDir::new().unwrap();
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let finished = Arc::new(AtomicUsize::new(0));

        let finished_in = Arc::clone(&finished);
        let watcher = Watcher::builder(dir.path())
            .debounce(Duration::ZERO)
            .on_any(move |_, _| {
                started_tx.send(())?;
                std::thread::sleep(Duration::from_millis(200));
                finished_in.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();

        let (tx, source) = ChannelSource::channel();
        watcher.start_with(source).unwrap();
        tx.send(WatchEvent::created(dir.path().join("a"))).unwrap();
        tx.send(WatchEvent::created(dir.path().join("b"))).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        watcher.stop().unwrap();
        // the in-flight call completed, the queued one never started
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(started_rx.try_recv().is_err());
    }

    #[test]
    fn test_from_config() {
        let mut config = WatchConfig::new("/srv/site");
        config.backend = "reload".to_string();
        config.debounce_ms = 300;

        let watcher = WatcherBuilder::from_config(&config).build().unwrap();
        assert_eq!(watcher.backend_selector(), "reload");
        assert_eq!(
            watcher.session().debounce_window(),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_start_with_missing_dir_fails_synchronously() {
        let dir = TempDir::new().unwrap();
        let watcher = Watcher::builder(dir.path().join("gone"))
            .on_any(|_, _| Ok(()))
            .build()
            .unwrap();

        assert!(watcher.start().is_err());
        assert_eq!(watcher.state(), WatchState::Stopped);
    }
}
