//! Shared, thread-safe session state
//!
//! `SessionTracker` is the single owner of the accounting engine and the
//! liveness monitor. Every public method takes the one lock for its whole
//! duration, so a report, a reset and a stats read can never interleave.

use super::accounting::SessionAccounting;
use super::liveness::LivenessMonitor;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::types::{SessionStats, StateReport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct TrackerState {
    accounting: SessionAccounting,
    liveness: LivenessMonitor,
}

pub struct SessionTracker {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
}

impl SessionTracker {
    /// Tracker on the system clock
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            state: Mutex::new(TrackerState {
                accounting: SessionAccounting::new(config, started),
                liveness: LivenessMonitor::new(config.heartbeat_timeout_seconds),
            }),
            clock,
        }
    }

    // Every mutation completes without panicking, so a poisoned lock still
    // guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a validated report and return the resulting snapshot
    pub fn report(&self, report: StateReport) -> SessionStats {
        let mut state = self.lock();
        state.liveness.record_seen(self.clock.now());

        let was_doomscrolling = state.accounting.snapshot().is_doomscrolling;
        state.accounting.record(report.is_active, report.timestamp);
        let stats = state.accounting.snapshot();

        if stats.is_doomscrolling != was_doomscrolling {
            tracing::info!(
                is_doomscrolling = stats.is_doomscrolling,
                timestamp = report.timestamp,
                owed_usd = stats.owed_usd,
                "session.state_changed"
            );
        } else {
            tracing::debug!(
                is_active = report.is_active,
                timestamp = report.timestamp,
                "session.report"
            );
        }

        stats
    }

    pub fn stats(&self) -> SessionStats {
        self.lock().accounting.snapshot()
    }

    /// Start a new session. Safe to call repeatedly.
    pub fn reset(&self) -> SessionStats {
        let mut state = self.lock();
        state.accounting.reset(self.clock.now());
        let stats = state.accounting.snapshot();
        tracing::info!(session_id = %stats.session_id, "session.reset");
        stats
    }

    /// Liveness check; may flip the detector to offline as a side effect
    pub fn is_alive(&self) -> bool {
        let now = self.clock.now();
        self.lock().liveness.is_alive(now)
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.lock().liveness.last_seen()
    }
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}
