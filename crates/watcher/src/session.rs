//! Watch session state, gate and dispatch

use crate::debounce::DebounceGate;
use crate::error::{Result, WatchError};
use crate::event::WatchEvent;
use crate::handlers::HandlerSet;
use parking_lot::RwLock;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

thread_local! {
    // address of the session whose handler this thread is running, or 0
    static DISPATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Outcome of handing one raw event to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Gate was open and the handler ran
    Forwarded,
    /// Gate was closed, nothing ran
    Suppressed,
}

/// Counters for one session
///
/// `forwarded` counts events that passed the gate, including those whose
/// dispatch then failed; `failed` counts failures seen by an [`EventSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub forwarded: u64,
    pub suppressed: u64,
    pub failed: u64,
}

/// One active watch on one path
///
/// Handlers receive a reference to this session alongside the event.
/// A closed session drops every delivered event; closing waits for the
/// handler that is running, if any.
#[derive(Debug)]
pub struct WatchSession {
    path: PathBuf,
    gate: DebounceGate,
    handlers: HandlerSet,
    open: RwLock<bool>,
    forwarded: AtomicU64,
    suppressed: AtomicU64,
    failed: AtomicU64,
}

impl WatchSession {
    pub fn new(path: PathBuf, window: Duration, handlers: HandlerSet) -> Self {
        Self {
            path,
            gate: DebounceGate::new(window),
            handlers,
            open: RwLock::new(true),
            forwarded: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Directory being observed
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn debounce_window(&self) -> Duration {
        self.gate.window()
    }

    /// Time of the most recently forwarded event
    pub fn last_fired(&self) -> Option<Instant> {
        self.gate.last_fired()
    }

    pub fn handlers(&self) -> &HandlerSet {
        &self.handlers
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Stop delivery; returns once no handler of this session is running
    ///
    /// Must not be called from one of this session's handlers, see
    /// [`in_handler`](Self::in_handler).
    pub(crate) fn close(&self) {
        *self.open.write() = false;
    }

    pub(crate) fn reopen(&self) {
        *self.open.write() = true;
    }

    /// Whether the current thread is inside one of this session's handlers
    pub fn in_handler(&self) -> bool {
        DISPATCHING.with(|d| d.get() == self.addr())
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    /// Gate the event, then invoke the handler for its kind
    pub fn handle_event(&self, event: &WatchEvent) -> Result<Dispatch> {
        self.handle_event_at(event, Instant::now())
    }

    pub(crate) fn handle_event_at(&self, event: &WatchEvent, now: Instant) -> Result<Dispatch> {
        trace!(kind = %event.kind, path = %event.path.display(), "raw event");

        if !self.gate.admit_at(now) {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %event.kind, path = %event.path.display(), "event debounced");
            return Ok(Dispatch::Suppressed);
        }

        let result = self.handlers.require(event.kind).and_then(|handler| {
            handler(self, event).map_err(|e| WatchError::HandlerFailed {
                kind: event.kind,
                path: event.path.clone(),
                source: e.into(),
            })
        });
        // counted once the handler has returned
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        result?;

        Ok(Dispatch::Forwarded)
    }
}

/// Handle a raw event source uses to push events into a session
///
/// Delivery is synchronous: the handler runs on the caller's thread, so
/// events are handled in the order the source emits them.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: Arc<WatchSession>,
}

impl EventSink {
    pub fn new(session: Arc<WatchSession>) -> Self {
        Self { session }
    }

    /// Deliver one event, logging dispatch failures
    ///
    /// Events delivered after the session is closed are dropped.
    pub fn deliver(&self, event: WatchEvent) {
        let session = &self.session;
        let open = session.open.read();
        if !*open {
            trace!(path = %event.path.display(), "session closed, event dropped");
            return;
        }

        let outer = DISPATCHING.with(|d| d.replace(session.addr()));
        let result = session.handle_event(&event);
        DISPATCHING.with(|d| d.set(outer));
        drop(open);

        if let Err(e) = result {
            session.failed.fetch_add(1, Ordering::Relaxed);
            error!(path = %session.path.display(), "dispatch failed: {e}");
        }
    }

    pub fn session(&self) -> &Arc<WatchSession> {
        &self.session
    }
}
