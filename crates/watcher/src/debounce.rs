//! Session-wide debounce gate
//!
//! One timer is shared by every event kind: a created event and a modified
//! event inside the same window collapse into whichever arrived first.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Default debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Time gate consulted once per raw event
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    /// Time of the last forwarded event, `None` until the first one
    last_fired: Mutex<Option<Instant>>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Mutex::new(None),
        }
    }

    /// Check the gate against the current time
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Check the gate at `now`
    ///
    /// Returns true and records `now` when at least one window has passed
    /// since the last forwarded event. Suppressed calls leave the timestamp
    /// untouched. Check and update happen under one lock.
    pub fn admit_at(&self, now: Instant) -> bool {
        let mut last = self.last_fired.lock();
        if let Some(prev) = *last {
            // saturates to zero when `now` precedes `prev`
            if now.saturating_duration_since(prev) < self.window {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_fired(&self) -> Option<Instant> {
        *self.last_fired.lock()
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
