//! Raw event sources
//!
//! A source observes one directory (non-recursive) and pushes every raw
//! change into an [`EventSink`] from its own thread, one event at a time.

use crate::error::{Result, WatchError};
use crate::event::{RenamePairer, WatchEvent, RENAME_PAIR_WINDOW};
use crate::session::EventSink;
use crossbeam_channel::{select, Receiver, Sender};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::Path;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Producer of raw file system events
///
/// `watch` must return once observation is set up; delivery continues on
/// the source's own thread until the source is dropped.
pub trait EventSource: Send {
    fn watch(&mut self, path: &Path, sink: EventSink) -> Result<()>;
}

/// Native backend built on the platform's recommended notify watcher
///
/// notify's callback only forwards raw events; a translator thread pairs
/// rename halves with [`RenamePairer`] and delivers the result, so a file
/// moved out of the directory is reported once the pairing window lapses.
#[derive(Default)]
pub struct NotifySource {
    config: Config,
    watcher: Option<RecommendedWatcher>,
    stop: Option<Sender<()>>,
    translator: Option<JoinHandle<()>>,
}

impl NotifySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            watcher: None,
            stop: None,
            translator: None,
        }
    }
}

impl EventSource for NotifySource {
    fn watch(&mut self, path: &Path, sink: EventSink) -> Result<()> {
        if self.watcher.is_some() {
            return Err(WatchError::InitFailed {
                reason: "notify source already watching".to_string(),
            });
        }

        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<notify::Event>();
        let event_handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!("file system event error: {e}"),
        };

        let mut watcher = RecommendedWatcher::new(event_handler, self.config.clone())?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let translator = std::thread::Builder::new()
            .name(format!("notify-source:{}", path.display()))
            .spawn(move || translate(raw_rx, stop_rx, sink))?;

        debug!("notify watcher registered for {}", path.display());
        self.watcher = Some(watcher);
        self.stop = Some(stop);
        self.translator = Some(translator);
        Ok(())
    }
}

fn translate(raw_rx: Receiver<notify::Event>, stop_rx: Receiver<()>, sink: EventSink) {
    let mut renames = RenamePairer::new();
    loop {
        select! {
            recv(raw_rx) -> msg => match msg {
                Ok(raw) => {
                    for ev in renames.push(raw) {
                        sink.deliver(ev);
                    }
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => return,
            default(RENAME_PAIR_WINDOW) => {
                if let Some(ev) = renames.evict() {
                    sink.deliver(ev);
                }
            }
        }
    }
    if let Some(ev) = renames.flush() {
        sink.deliver(ev);
    }
}

impl Drop for NotifySource {
    fn drop(&mut self) {
        // unregister first so no new raw events arrive
        self.watcher.take();
        self.stop.take();
        if let Some(translator) = self.translator.take() {
            if translator.join().is_err() {
                warn!("notify source translator panicked");
            }
        }
    }
}

/// Source fed through a channel
///
/// Events sent on the paired [`Sender`] are delivered, in order, from a
/// dedicated thread. Dropping the source stops that thread and closes the
/// channel.
pub struct ChannelSource {
    rx: Option<Receiver<WatchEvent>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ChannelSource {
    pub fn channel() -> (Sender<WatchEvent>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (
            tx,
            Self {
                rx: Some(rx),
                stop: None,
                worker: None,
            },
        )
    }
}

impl EventSource for ChannelSource {
    fn watch(&mut self, path: &Path, sink: EventSink) -> Result<()> {
        let rx = self.rx.take().ok_or_else(|| WatchError::InitFailed {
            reason: "channel source already consumed".to_string(),
        })?;
        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(0);

        let worker = std::thread::Builder::new()
            .name(format!("channel-source:{}", path.display()))
            .spawn(move || loop {
                select! {
                    recv(rx) -> msg => match msg {
                        Ok(ev) => sink.deliver(ev),
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _ => break,
                }
            })?;

        self.stop = Some(stop);
        self.worker = Some(worker);
        Ok(())
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        // disconnecting `stop` wakes the worker
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("channel source worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{Handler, HandlerSet};
    use crate::session::WatchSession;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_channel_source_delivers_in_order() {
        let (seen_tx, seen_rx) = crossbeam_channel::unbounded();
        let handler: Handler = Arc::new(move |_: &WatchSession, ev: &WatchEvent| -> anyhow::Result<()> {
            seen_tx.send(ev.clone())?;
            Ok(())
        });
        let session = Arc::new(WatchSession::new(
            PathBuf::from("/tmp"),
            Duration::ZERO,
            HandlerSet::resolve(None, None, None, None, Some(handler)),
        ));

        let (tx, mut source) = ChannelSource::channel();
        source.watch(Path::new("/tmp"), EventSink::new(session)).unwrap();

        tx.send(WatchEvent::created("/tmp/a")).unwrap();
        tx.send(WatchEvent::deleted("/tmp/a")).unwrap();

        let timeout = Duration::from_secs(2);
        assert_eq!(seen_rx.recv_timeout(timeout).unwrap(), WatchEvent::created("/tmp/a"));
        assert_eq!(seen_rx.recv_timeout(timeout).unwrap(), WatchEvent::deleted("/tmp/a"));
    }

    #[test]
    fn test_channel_source_single_use() {
        let session = Arc::new(WatchSession::new(
            PathBuf::from("/tmp"),
            Duration::ZERO,
            HandlerSet::default(),
        ));
        let (_tx, mut source) = ChannelSource::channel();
        let sink = EventSink::new(session);

        source.watch(Path::new("/tmp"), sink.clone()).unwrap();
        assert!(matches!(
            source.watch(Path::new("/tmp"), sink),
            Err(WatchError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_notify_source_rejects_missing_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let session = Arc::new(WatchSession::new(
            missing.clone(),
            Duration::ZERO,
            HandlerSet::default(),
        ));

        let mut source = NotifySource::new();
        let err = source.watch(&missing, EventSink::new(session)).unwrap_err();
        assert!(matches!(err, WatchError::PathWatchFailed { .. }));
    }
}
