//! Per-kind handler slots

use crate::error::{Result, WatchError};
use crate::event::{EventKind, WatchEvent};
use crate::session::WatchSession;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied event handler
///
/// Invoked synchronously on the delivering thread with the session and the
/// raw event payload.
pub type Handler = Arc<dyn Fn(&WatchSession, &WatchEvent) -> anyhow::Result<()> + Send + Sync>;

/// Resolved handler table, one slot per [`EventKind`]
///
/// Slots may be empty. An event whose slot is empty fails at dispatch with
/// [`WatchError::HandlerUnavailable`].
#[derive(Clone, Default)]
pub struct HandlerSet {
    slots: [Option<Handler>; 4],
}

impl HandlerSet {
    /// Build the table from individual handlers and an optional catch-all
    ///
    /// A catch-all fills every slot and the individual handlers are ignored.
    pub fn resolve(
        on_created: Option<Handler>,
        on_modified: Option<Handler>,
        on_deleted: Option<Handler>,
        on_moved: Option<Handler>,
        on_any: Option<Handler>,
    ) -> Self {
        match on_any {
            Some(any) => Self {
                slots: [
                    Some(Arc::clone(&any)),
                    Some(Arc::clone(&any)),
                    Some(Arc::clone(&any)),
                    Some(any),
                ],
            },
            None => Self {
                slots: [on_created, on_modified, on_deleted, on_moved],
            },
        }
    }

    pub fn get(&self, kind: EventKind) -> Option<&Handler> {
        self.slots[kind.slot()].as_ref()
    }

    /// Look up the handler for `kind`, failing if the slot is empty
    pub fn require(&self, kind: EventKind) -> Result<&Handler> {
        self.get(kind).ok_or(WatchError::HandlerUnavailable { kind })
    }

    /// Kinds with no handler
    pub fn missing(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_none())
            .collect()
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<EventKind> = EventKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect();
        f.debug_struct("HandlerSet")
            .field("registered", &registered)
            .finish()
    }
}
