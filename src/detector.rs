//! Frame pipeline orchestration
//!
//! Runs the detector side of the engine for one subject:
//! FrameObservation → Heuristics → raw signal → Hysteresis → FrameDecision

use crate::config::{ClassifierConfig, HeuristicsConfig};
use crate::error::EngineError;
use crate::heuristics::{self, HeuristicSignals, PostureReading};
use crate::hysteresis::HysteresisClassifier;
use crate::types::{Decision, FrameObservation};
use serde::{Deserialize, Serialize};

/// Everything decided about one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDecision {
    pub timestamp: f64,
    pub signals: HeuristicSignals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posture: Option<PostureReading>,
    pub raw_active: bool,
    pub decision: Decision,
}

impl FrameDecision {
    /// Debounced doomscrolling state after this frame
    pub fn is_doomscrolling(&self) -> bool {
        self.decision.state
    }
}

/// Parse one NDJSON frame line
pub fn parse_frame(line: &str) -> Result<FrameObservation, EngineError> {
    let frame: FrameObservation = serde_json::from_str(line)?;
    if !frame.timestamp.is_finite() {
        return Err(EngineError::InvalidFrame(
            "timestamp must be finite".to_string(),
        ));
    }
    Ok(frame)
}

/// Stateful per-detector processor.
///
/// Owns its classifier; run one per camera/subject on a single thread.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    heuristics: HeuristicsConfig,
    classifier: HysteresisClassifier,
    last_timestamp: Option<f64>,
}

impl FramePipeline {
    pub fn new(
        heuristics: HeuristicsConfig,
        classifier: &ClassifierConfig,
    ) -> Result<Self, EngineError> {
        heuristics.validate()?;
        Ok(Self {
            heuristics,
            classifier: HysteresisClassifier::new(classifier)?,
            last_timestamp: None,
        })
    }

    /// Classify one frame
    pub fn process(&mut self, frame: &FrameObservation) -> FrameDecision {
        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                tracing::warn!(
                    timestamp = frame.timestamp,
                    previous = last,
                    "frame timestamps went backwards; restarting window"
                );
                self.clear();
            }
        }
        self.last_timestamp = Some(frame.timestamp);

        let signals =
            heuristics::evaluate(frame.subject.as_ref(), &frame.objects, &self.heuristics);
        if !signals.subject_detected {
            tracing::debug!(timestamp = frame.timestamp, "no subject detected");
        }

        let posture = frame.subject.as_ref().map(heuristics::posture_reading);
        let raw_active = signals.is_active();
        let decision = self.classifier.tick(frame.timestamp, raw_active);

        if decision.transitioned {
            tracing::info!(
                timestamp = frame.timestamp,
                doomscrolling = decision.state,
                fraction = ?decision.fraction,
                "detector.transition"
            );
        }

        FrameDecision {
            timestamp: frame.timestamp,
            signals,
            posture,
            raw_active,
            decision,
        }
    }

    /// Parse and classify one NDJSON line
    pub fn process_line(&mut self, line: &str) -> Result<FrameDecision, EngineError> {
        let frame = parse_frame(line)?;
        Ok(self.process(&frame))
    }

    pub fn is_doomscrolling(&self) -> bool {
        self.classifier.state()
    }

    pub fn classifier(&self) -> &HysteresisClassifier {
        &self.classifier
    }

    /// Forget buffered frames (e.g. after the camera restarts)
    pub fn clear(&mut self) {
        self.classifier.clear();
        self.last_timestamp = None;
    }
}
