//! Coalescing of diagnostics runs.
//!
//! Changes are reported with [`DiagnosticsDebouncer::notify`]. A run becomes
//! due once no change arrived for the debounce window, and at most one run is
//! in flight; changes seen during a run are merged into a single follow-up.
//! Time is passed in explicitly so hosts and tests drive the clock.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct DebounceState {
    dirty: bool,
    in_flight: bool,
    last_change: Option<Instant>,
}

#[derive(Debug)]
pub struct DiagnosticsDebouncer {
    window: Duration,
    state: Mutex<DebounceState>,
}

impl DiagnosticsDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(DebounceState::default()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn notify(&self, now: Instant) {
        let mut state = self.state.lock();
        state.dirty = true;
        state.last_change = Some(now);
    }

    /// When the pending run becomes due, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        let state = self.state.lock();
        if !state.dirty {
            return None;
        }
        state.last_change.map(|at| at + self.window)
    }

    /// Start a run if one is due at `now`. Returns `false` when nothing
    /// changed, the window is still open, or a run is already in flight.
    pub fn try_start(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if !state.dirty || state.in_flight {
            return false;
        }
        if let Some(at) = state.last_change
            && now < at + self.window
        {
            return false;
        }
        state.dirty = false;
        state.in_flight = true;
        true
    }

    /// Mark the in-flight run finished. Returns `true` when changes arrived
    /// meanwhile and a follow-up run is owed.
    pub fn finish(&self) -> bool {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.dirty
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }
}

#[cfg(test)]
#[path = "../tests/debounce_tests.rs"]
mod debounce_tests;
