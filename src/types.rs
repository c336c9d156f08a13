//! Core types for the Doomscroll Tax engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: per-frame observations, classifier decisions, state reports, and the
//! session stats snapshot served to the dashboard.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of keypoints in the COCO body layout
pub const KEYPOINT_COUNT: usize = 17;

/// COCO class id for "cell phone"
pub const PHONE_CLASS_ID: u32 = 67;

/// Anatomical keypoint indices (COCO ordering)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

/// A single keypoint in normalized (0-1) frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Full-body keypoints for one detected subject.
///
/// Serialized as a list of 17 `[x, y]` pairs. Anything else is rejected at the
/// boundary, so a missing subject has to be expressed as an absent value
/// rather than a list of zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Keypoints {
    points: [Point; KEYPOINT_COUNT],
}

impl Keypoints {
    pub fn new(points: [Point; KEYPOINT_COUNT]) -> Self {
        Self { points }
    }

    pub fn get(&self, part: BodyPart) -> Point {
        self.points[part as usize]
    }

    pub fn set(&mut self, part: BodyPart, point: Point) {
        self.points[part as usize] = point;
    }
}

impl TryFrom<Vec<[f64; 2]>> for Keypoints {
    type Error = EngineError;

    fn try_from(raw: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        if raw.len() != KEYPOINT_COUNT {
            return Err(EngineError::InvalidFrame(format!(
                "expected {} keypoints, got {}",
                KEYPOINT_COUNT,
                raw.len()
            )));
        }

        let mut points = [Point::default(); KEYPOINT_COUNT];
        for (slot, [x, y]) in points.iter_mut().zip(raw) {
            if !x.is_finite() || !y.is_finite() {
                return Err(EngineError::InvalidFrame(
                    "keypoint coordinates must be finite".to_string(),
                ));
            }
            *slot = Point::new(x, y);
        }

        Ok(Self { points })
    }
}

impl From<Keypoints> for Vec<[f64; 2]> {
    fn from(keypoints: Keypoints) -> Self {
        keypoints.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

/// Axis-aligned bounding box `(x1, y1, x2, y2)` in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One object detector hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Everything the upstream detectors saw in one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameObservation {
    /// Monotonic frame timestamp (seconds)
    pub timestamp: f64,
    /// Keypoints of the detected subject; `None` when nobody is in frame
    #[serde(default)]
    pub subject: Option<Keypoints>,
    /// Object detections for this frame (any class)
    #[serde(default)]
    pub objects: Vec<ObjectDetection>,
}

/// Per-tick classifier input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub timestamp: f64,
    pub is_active: bool,
}

/// Result of feeding one tick into the hysteresis classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Debounced state after this tick
    pub state: bool,
    /// Positive fraction used for the decision (`None` when the window was empty)
    pub fraction: Option<f64>,
    /// Whether the state flipped on this tick
    pub transitioned: bool,
}

/// Debounced state report sent from the detector to the accounting server
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub is_active: bool,
    /// Unix-epoch seconds
    pub timestamp: f64,
}

/// Flat snapshot of the accounting session served to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub doom_seconds_today: f64,
    pub last_doomscrolled_at: Option<f64>,
    pub clean_streak_seconds: f64,
    pub penalty_rate_per_second: f64,
    pub is_doomscrolling: bool,
    pub owed_usd: f64,
    pub reports_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoints_require_full_body_layout() {
        let short: Result<Keypoints, _> = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4]]");
        assert!(short.is_err());

        let full = serde_json::to_string(&vec![[0.5, 0.5]; KEYPOINT_COUNT]).unwrap();
        let keypoints: Keypoints = serde_json::from_str(&full).unwrap();
        assert_eq!(keypoints.get(BodyPart::LeftWrist), Point::new(0.5, 0.5));
    }

    #[test]
    fn test_missing_subject_is_distinct_from_zeroed_keypoints() {
        let frame: FrameObservation =
            serde_json::from_str(r#"{"timestamp": 1.5, "objects": []}"#).unwrap();
        assert!(frame.subject.is_none());

        let frame: FrameObservation = serde_json::from_str(r#"{"timestamp": 1.5}"#).unwrap();
        assert!(frame.subject.is_none());
        assert!(frame.objects.is_empty());
    }

    #[test]
    fn test_bounding_box_center() {
        let bbox: BoundingBox = serde_json::from_str("[0.2, 0.4, 0.6, 0.8]").unwrap();
        let center = bbox.center();
        assert!((center.x - 0.4).abs() < 1e-12);
        assert!((center.y - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.3, 0.4);
        assert!((a.distance(&b) - 0.5).abs() < 1e-12);
    }
}
