//! Detector liveness from report heartbeats
//!
//! Any report, active or not, counts as a heartbeat. Expiry is lazy: the
//! alive flag is only re-evaluated when someone asks, so consumers must poll
//! more often than the timeout to notice the detector going away promptly.

#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    timeout_seconds: f64,
    last_seen: Option<f64>,
    heartbeat_alive: bool,
}

impl LivenessMonitor {
    pub fn new(timeout_seconds: f64) -> Self {
        Self {
            timeout_seconds,
            last_seen: None,
            heartbeat_alive: false,
        }
    }

    /// Record a heartbeat received at `now`
    pub fn record_seen(&mut self, now: f64) {
        self.last_seen = Some(now);
        self.heartbeat_alive = true;
    }

    /// Whether the detector is still reporting.
    ///
    /// A heartbeat exactly `timeout_seconds` old is still alive; the flag
    /// drops once the silence is strictly longer than the timeout.
    pub fn is_alive(&mut self, now: f64) -> bool {
        if self.heartbeat_alive {
            if let Some(last_seen) = self.last_seen {
                if now - last_seen > self.timeout_seconds {
                    self.heartbeat_alive = false;
                    tracing::info!(
                        silent_for = now - last_seen,
                        timeout = self.timeout_seconds,
                        "liveness.expired"
                    );
                }
            }
        }
        self.heartbeat_alive
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.last_seen
    }
}
