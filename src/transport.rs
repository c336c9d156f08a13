//! Detector → server report delivery
//!
//! Delivery is best-effort and fire-and-forget. A send that fails or times out
//! is logged and dropped; the accounting side is built so that missing reports
//! only understate the bill.

use crate::clock::Clock;
use crate::config::TransportConfig;
use crate::error::EngineError;
use crate::types::StateReport;
use std::sync::Arc;
use std::time::Duration;

/// Something that accepts state reports without blocking the frame loop
pub trait ReportSink: Send + Sync {
    fn send(&self, report: StateReport);
}

/// Decides which debounced states are worth reporting.
///
/// State changes are always reported; an unchanged state is re-sent at most
/// once per `interval_seconds` so the server keeps accruing and keeps seeing
/// heartbeats.
#[derive(Debug, Clone)]
pub struct ReportScheduler {
    interval_seconds: f64,
    last_sent: Option<(f64, bool)>,
}

impl ReportScheduler {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval_seconds,
            last_sent: None,
        }
    }

    /// Whether a report for `state` at frame time `now` should go out
    pub fn should_send(&mut self, now: f64, state: bool) -> bool {
        let due = match self.last_sent {
            None => true,
            Some((_, last_state)) if last_state != state => true,
            Some((at, _)) => now - at >= self.interval_seconds || now < at,
        };
        if due {
            self.last_sent = Some((now, state));
        }
        due
    }
}

/// Posts reports to `POST {server_url}/report`
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
    runtime: tokio::runtime::Handle,
}

impl HttpReporter {
    /// Must be called from within a Tokio runtime
    pub fn new(config: &TransportConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/report", config.server_url.trim_end_matches('/')),
            runtime,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportSink for HttpReporter {
    fn send(&self, report: StateReport) {
        let request = self.client.post(&self.endpoint).json(&report);
        let endpoint = self.endpoint.clone();
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(is_active = report.is_active, "transport.sent");
                }
                Ok(response) => {
                    tracing::warn!(
                        status = %response.status(),
                        endpoint = %endpoint,
                        "transport.rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, endpoint = %endpoint, "transport.dropped");
                }
            }
        });
    }
}

/// Discards every report (offline runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn send(&self, _report: StateReport) {}
}

/// Glue between the frame loop and a sink: schedules, stamps, forwards
pub struct Reporter {
    scheduler: ReportScheduler,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
}

impl Reporter {
    pub fn new(interval_seconds: f64, sink: Arc<dyn ReportSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler: ReportScheduler::new(interval_seconds),
            sink,
            clock,
        }
    }

    /// Offer the debounced state for frame time `frame_time`; returns whether
    /// a report was handed to the sink
    pub fn offer(&mut self, frame_time: f64, state: bool) -> bool {
        if !self.scheduler.should_send(frame_time, state) {
            return false;
        }
        self.sink.send(StateReport {
            is_active: state,
            timestamp: self.clock.now(),
        });
        true
    }
}

/// Probe the server's smoke-test route
pub async fn check_server(server_url: &str, timeout: Duration) -> Result<(), EngineError> {
    let url = format!("{}/test", server_url.trim_end_matches('/'));
    let response = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Transport(e.to_string()))?
        .get(&url)
        .send()
        .await
        .map_err(|e| EngineError::Transport(e.to_string()))?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(EngineError::Transport(format!(
            "{url} answered {}",
            response.status()
        )))
    }
}
