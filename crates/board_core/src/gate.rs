//! Single-flight busy gate wrapped around user-triggered store mutations.
//!
//! The gate tracks whether an action is in flight and derives when the busy indicator
//! should be visible. It never queues or rejects callers: the board serializes actions by
//! awaiting the store between [`ConcurrencyGate::block`] and the guard's drop.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, warn};

const DEFAULT_LOWER_LIMIT: Duration = Duration::from_millis(350);
const DEFAULT_UPPER_LIMIT: Duration = Duration::from_millis(1000);
const DEFAULT_FORCE_CLEAR_AFTER: Duration = Duration::from_secs(30);

/// Presentation thresholds for the busy indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTimings {
    /// Blocks shorter than this never show the indicator.
    pub lower_limit: Duration,
    /// Once shown, the indicator stays until this long after the block started.
    pub upper_limit: Duration,
    /// The indicator clears itself if the gate is still blocked after this long.
    pub force_clear_after: Duration,
}

impl Default for GateTimings {
    fn default() -> Self {
        Self {
            lower_limit: DEFAULT_LOWER_LIMIT,
            upper_limit: DEFAULT_UPPER_LIMIT,
            force_clear_after: DEFAULT_FORCE_CLEAR_AFTER,
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    depth: usize,
    blocked_at: Option<Instant>,
    last_window: Option<(Instant, Instant)>,
    cycles: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGate {
    timings: GateTimings,
    state: Arc<Mutex<GateState>>,
}

impl ConcurrencyGate {
    pub fn new(timings: GateTimings) -> Self {
        Self {
            timings,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    pub fn timings(&self) -> GateTimings {
        self.timings
    }

    /// Marks the system busy until the returned guard is dropped.
    pub fn block(&self) -> GateGuard {
        let mut state = self.lock();
        if state.depth > 0 {
            warn!(depth = state.depth, "gate: block requested while already blocked");
        } else {
            state.blocked_at = Some(Instant::now());
            debug!("gate: blocked");
        }
        state.depth += 1;
        GateGuard { gate: self.clone() }
    }

    fn unblock(&self) {
        let mut state = self.lock();
        state.depth = state.depth.saturating_sub(1);
        state.cycles += 1;
        if state.depth > 0 {
            return;
        }
        if let Some(started) = state.blocked_at.take() {
            let released = Instant::now();
            state.last_window = Some((started, released));
            debug!(
                held_ms = released.saturating_duration_since(started).as_millis() as u64,
                "gate: released"
            );
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.lock().depth > 0
    }

    /// Number of completed block/unblock pairs.
    pub fn cycles(&self) -> u64 {
        self.lock().cycles
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator_visible_at(Instant::now())
    }

    pub fn indicator_visible_at(&self, now: Instant) -> bool {
        let state = self.lock();
        if let Some(started) = state.blocked_at {
            let elapsed = now.saturating_duration_since(started);
            return elapsed >= self.timings.lower_limit
                && elapsed < self.timings.force_clear_after;
        }

        match state.last_window {
            Some((started, released)) => {
                let held = released.saturating_duration_since(started);
                held >= self.timings.lower_limit
                    && now.saturating_duration_since(started) < self.timings.upper_limit
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped acquisition of the gate; dropping it unblocks exactly once.
#[must_use = "the gate unblocks as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GateGuard {
    gate: ConcurrencyGate,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.unblock();
    }
}

#[cfg(test)]
#[path = "tests/gate_tests.rs"]
mod tests;
