//! Watch events and translation from raw notify events

use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a rename origin waits for its target before it counts as a delete
pub const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(100);

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// File created
    Created,
    /// File modified
    Modified,
    /// File deleted
    Deleted,
    /// File moved or renamed
    Moved,
}

impl EventKind {
    /// All kinds, in handler slot order
    pub const ALL: [EventKind; 4] = [
        EventKind::Created,
        EventKind::Modified,
        EventKind::Deleted,
        EventKind::Moved,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            EventKind::Created => 0,
            EventKind::Modified => 1,
            EventKind::Deleted => 2,
            EventKind::Moved => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
            EventKind::Moved => "moved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File system event as handed to handlers
///
/// For [`EventKind::Moved`], `path` is the origin and `destination` the
/// target. Every other kind has no destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Type of change
    pub kind: EventKind,
    /// Path that changed
    pub path: PathBuf,
    /// Target path of a move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl WatchEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::single(EventKind::Created, path.into())
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::single(EventKind::Modified, path.into())
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::single(EventKind::Deleted, path.into())
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: EventKind::Moved,
            path: from.into(),
            destination: Some(to.into()),
        }
    }

    fn single(kind: EventKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            destination: None,
        }
    }

    /// Origin of a move
    pub fn source(&self) -> Option<&Path> {
        match self.kind {
            EventKind::Moved => Some(&self.path),
            _ => None,
        }
    }

    /// Target of a move
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Translate a raw notify event into watch events, statelessly
    ///
    /// Non-move kinds yield one event per affected path. A rename half on its
    /// own stands for the file leaving (`From` becomes Deleted) or arriving
    /// (`To` becomes Created). Use [`RenamePairer`] to join halves that
    /// belong to one move.
    pub fn from_notify(event: notify::Event) -> Vec<WatchEvent> {
        use notify::EventKind as Raw;

        let kind = match event.kind {
            Raw::Create(_) => EventKind::Created,
            Raw::Remove(_) => EventKind::Deleted,
            Raw::Modify(ModifyKind::Name(RenameMode::From)) => EventKind::Deleted,
            Raw::Modify(ModifyKind::Name(RenameMode::To)) => EventKind::Created,
            Raw::Modify(ModifyKind::Name(_)) => return rename_events(event.paths),
            Raw::Modify(_) | Raw::Any => EventKind::Modified,
            Raw::Access(_) | Raw::Other => return Vec::new(),
        };

        event
            .paths
            .into_iter()
            .map(|path| Self::single(kind, path))
            .collect()
    }
}

fn rename_events(paths: Vec<PathBuf>) -> Vec<WatchEvent> {
    let mut paths = paths.into_iter();
    match (paths.next(), paths.next()) {
        (Some(from), Some(to)) => vec![WatchEvent::moved(from, to)],
        (Some(path), None) => vec![WatchEvent::modified(path)],
        _ => Vec::new(),
    }
}

/// Rename origin waiting for its target
#[derive(Debug)]
struct PendingFrom {
    tracker: Option<usize>,
    path: PathBuf,
    at: Instant,
}

/// Joins rename halves into moves
///
/// Backends report a rename as a `From` half followed by a `To` half
/// (inotify links them with a cookie, Windows sends them back to back), and
/// inotify then repeats the move as one `Both` event. A file moved into the
/// directory only produces `To`; one moved out only produces `From`.
///
/// A `From` is held until a matching `To` arrives, or until any other event
/// or [`evict`](Self::evict) after [`RENAME_PAIR_WINDOW`] turns it into a
/// Deleted event. A `To` with nothing to pair becomes Created. The `Both`
/// repeat of a move that was already paired is skipped.
#[derive(Debug, Default)]
pub struct RenamePairer {
    pending: Option<PendingFrom>,
    paired: Option<usize>,
}

impl RenamePairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one raw event, pairing rename halves
    pub fn push(&mut self, event: notify::Event) -> Vec<WatchEvent> {
        self.push_at(event, Instant::now())
    }

    pub(crate) fn push_at(&mut self, event: notify::Event, now: Instant) -> Vec<WatchEvent> {
        let tracker = event.attrs.tracker();
        match event.kind {
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                let mut out: Vec<WatchEvent> = self.flush().into_iter().collect();
                let mut paths = event.paths.into_iter();
                if let Some(path) = paths.next() {
                    self.pending = Some(PendingFrom { tracker, path, at: now });
                }
                out.extend(paths.map(WatchEvent::deleted));
                out
            }
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let mut out = Vec::new();
                let mut paths = event.paths.into_iter();
                let Some(to) = paths.next() else {
                    return self.flush().into_iter().collect();
                };
                match self.pending.take() {
                    Some(from) if from.tracker == tracker => {
                        self.paired = tracker;
                        out.push(WatchEvent::moved(from.path, to));
                    }
                    other => {
                        out.extend(other.map(|from| WatchEvent::deleted(from.path)));
                        out.push(WatchEvent::created(to));
                    }
                }
                out.extend(paths.map(WatchEvent::created));
                out
            }
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both))
                if tracker.is_some() && self.paired == tracker =>
            {
                self.paired = None;
                self.flush().into_iter().collect()
            }
            _ => {
                let mut out: Vec<WatchEvent> = self.flush().into_iter().collect();
                out.extend(WatchEvent::from_notify(event));
                out
            }
        }
    }

    /// Release a rename origin that waited longer than the pairing window
    pub fn evict(&mut self) -> Option<WatchEvent> {
        self.evict_at(Instant::now())
    }

    pub(crate) fn evict_at(&mut self, now: Instant) -> Option<WatchEvent> {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|from| now.saturating_duration_since(from.at) >= RENAME_PAIR_WINDOW);
        if expired {
            self.flush()
        } else {
            None
        }
    }

    /// Release any held rename origin as a delete
    pub fn flush(&mut self) -> Option<WatchEvent> {
        self.pending.take().map(|from| WatchEvent::deleted(from.path))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
