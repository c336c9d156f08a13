//! Sliding-window hysteresis classifier
//!
//! Converts a noisy per-frame boolean into a stable state. The classifier keeps
//! every tick from the trailing `window_seconds` and compares the positive
//! fraction against two thresholds: the state turns on at `enter_fraction` and
//! only turns off again at `exit_fraction`, so a fraction hovering between the
//! two never flips it.

use crate::config::ClassifierConfig;
use crate::error::EngineError;
use crate::types::{Decision, RawSignal};
use std::collections::VecDeque;

/// Debounces raw doomscrolling signals.
///
/// Owned by a single detector loop; not shared between threads.
#[derive(Debug, Clone)]
pub struct HysteresisClassifier {
    window: VecDeque<RawSignal>,
    /// Count of active entries currently in `window`
    positive_count: usize,
    state: bool,
    window_seconds: f64,
    enter_fraction: f64,
    exit_fraction: f64,
    min_samples: usize,
}

impl HysteresisClassifier {
    /// Create a classifier, rejecting thresholds that break `0 <= exit < enter <= 1`
    pub fn new(config: &ClassifierConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            window: VecDeque::new(),
            positive_count: 0,
            state: false,
            window_seconds: config.window_seconds,
            enter_fraction: config.enter_fraction,
            exit_fraction: config.exit_fraction,
            min_samples: config.min_samples.max(1),
        })
    }

    /// Feed one tick and return the (possibly unchanged) debounced state.
    ///
    /// Timestamps must be non-decreasing; eviction assumes arrival order is
    /// time order. A non-finite timestamp is ignored and leaves the window
    /// untouched.
    pub fn tick(&mut self, timestamp: f64, is_active: bool) -> Decision {
        if !timestamp.is_finite() {
            return Decision {
                state: self.state,
                fraction: self.fraction(),
                transitioned: false,
            };
        }

        self.window.push_back(RawSignal {
            timestamp,
            is_active,
        });
        if is_active {
            self.positive_count += 1;
        }

        let cutoff = timestamp - self.window_seconds;
        while let Some(front) = self.window.front() {
            if front.timestamp >= cutoff {
                break;
            }
            if front.is_active {
                self.positive_count -= 1;
            }
            self.window.pop_front();
        }

        if self.window.is_empty() {
            return Decision {
                state: self.state,
                fraction: None,
                transitioned: false,
            };
        }

        let denominator = self.window.len().max(self.min_samples);
        let fraction = self.positive_count as f64 / denominator as f64;

        let previous = self.state;
        if !self.state && fraction >= self.enter_fraction {
            self.state = true;
        } else if self.state && fraction <= self.exit_fraction {
            self.state = false;
        }

        Decision {
            state: self.state,
            fraction: Some(fraction),
            transitioned: self.state != previous,
        }
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn positive_count(&self) -> usize {
        self.positive_count
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Current positive fraction, `None` when the window is empty
    pub fn fraction(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let denominator = self.window.len().max(self.min_samples);
        Some(self.positive_count as f64 / denominator as f64)
    }

    /// Drop all buffered ticks and return to the off state
    pub fn clear(&mut self) {
        self.window.clear();
        self.positive_count = 0;
        self.state = false;
    }

    #[cfg(test)]
    fn recount(&self) -> usize {
        self.window.iter().filter(|s| s.is_active).count()
    }
}
