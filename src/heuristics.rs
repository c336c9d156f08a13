//! Geometric posture heuristics
//!
//! Pure functions over normalized keypoints and detector boxes. Nothing here
//! keeps state; the hysteresis classifier is responsible for smoothing.

use crate::config::HeuristicsConfig;
use crate::types::{BodyPart, BoundingBox, Keypoints, ObjectDetection, PHONE_CLASS_ID};
use serde::{Deserialize, Serialize};

/// Vertical landmarks used by the recline check, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureReading {
    pub shoulder_y: f64,
    pub hip_y: f64,
    pub knee_y: f64,
    /// `|hip_y - shoulder_y|`
    pub torso_gap: f64,
}

/// Outcome of both heuristics for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeuristicSignals {
    pub subject_detected: bool,
    pub is_reclining: bool,
    pub is_holding_phone: bool,
}

impl HeuristicSignals {
    /// Raw doomscrolling signal: reclining while holding a phone
    pub fn is_active(&self) -> bool {
        self.is_reclining && self.is_holding_phone
    }
}

/// Measure the shoulder, hip and knee lines
pub fn posture_reading(keypoints: &Keypoints) -> PostureReading {
    let shoulder_y = keypoints
        .get(BodyPart::LeftShoulder)
        .midpoint(&keypoints.get(BodyPart::RightShoulder))
        .y;
    let hip_y = keypoints
        .get(BodyPart::LeftHip)
        .midpoint(&keypoints.get(BodyPart::RightHip))
        .y;
    let knee_y = keypoints
        .get(BodyPart::LeftKnee)
        .midpoint(&keypoints.get(BodyPart::RightKnee))
        .y;

    PostureReading {
        shoulder_y,
        hip_y,
        knee_y,
        torso_gap: (hip_y - shoulder_y).abs(),
    }
}

/// A subject is reclining when the shoulder line sits close to the hip line.
///
/// Zeroed keypoints produce a gap of 0 and therefore always read as
/// reclining; "nobody in frame" must be handled before calling this.
pub fn is_reclining(keypoints: &Keypoints, threshold: f64) -> bool {
    posture_reading(keypoints).torso_gap < threshold
}

/// True when the box center lies within `threshold` of either wrist
pub fn is_holding_object(
    object_box: Option<&BoundingBox>,
    keypoints: &Keypoints,
    threshold: f64,
) -> bool {
    let Some(bbox) = object_box else {
        return false;
    };

    let center = bbox.center();
    let dist_left = center.distance(&keypoints.get(BodyPart::LeftWrist));
    let dist_right = center.distance(&keypoints.get(BodyPart::RightWrist));

    dist_left < threshold || dist_right < threshold
}

/// Any candidate near a wrist is enough
pub fn is_holding_any<'a, I>(candidates: I, keypoints: &Keypoints, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a BoundingBox>,
{
    candidates
        .into_iter()
        .any(|bbox| is_holding_object(Some(bbox), keypoints, threshold))
}

/// Phone-class detections at or above `min_confidence`
pub fn phone_candidates(
    objects: &[ObjectDetection],
    min_confidence: f64,
) -> impl Iterator<Item = &BoundingBox> {
    objects
        .iter()
        .filter(move |o| o.class_id == PHONE_CLASS_ID && o.confidence >= min_confidence)
        .map(|o| &o.bbox)
}

/// Evaluate both heuristics for one frame.
///
/// With no subject both signals are false. That loses precision (a person
/// briefly out of frame counts as not doomscrolling) but never invents a
/// positive.
pub fn evaluate(
    subject: Option<&Keypoints>,
    objects: &[ObjectDetection],
    config: &HeuristicsConfig,
) -> HeuristicSignals {
    let Some(keypoints) = subject else {
        return HeuristicSignals::default();
    };

    let phones = phone_candidates(objects, config.phone_min_confidence);

    HeuristicSignals {
        subject_detected: true,
        is_reclining: is_reclining(keypoints, config.reclined_threshold),
        is_holding_phone: is_holding_any(phones, keypoints, config.holding_phone_threshold),
    }
}
