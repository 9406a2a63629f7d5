//! Hand landmark input types.
//!
//! The external tracker delivers, per frame, zero or more detected hands with
//! 21 normalized keypoints each. Coordinates are in `[0, 1]` image space with
//! `y` growing downwards, and the image is mirrored horizontally relative to
//! the operator's own view.

use serde::{Deserialize, Serialize};

/// Number of keypoints the tracker reports per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Keypoint indices (MediaPipe hand landmark convention).
#[allow(missing_docs)]
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// A normalized 2-D position (depth is dropped once a keypoint is read).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate, 0.0 (left of image) to 1.0.
    pub x: f64,
    /// Vertical coordinate, 0.0 (top of image) to 1.0.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Midpoint between this point and another.
    #[must_use]
    pub fn midpoint(&self, other: &Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A single tracker keypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized x coordinate.
    pub x: f64,
    /// Normalized y coordinate.
    pub y: f64,
    /// Relative depth, when the tracker reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Keypoint {
    /// The keypoint projected onto the image plane.
    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Which physical hand, from the operator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    /// The operator's left hand.
    Left,
    /// The operator's right hand.
    Right,
}

impl Handedness {
    /// The other hand.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl std::fmt::Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// One detected hand in a tracker frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    /// Handedness label as reported by the tracker.
    pub handedness: Handedness,
    /// The keypoints, in [`index`] order.
    pub landmarks: Vec<Keypoint>,
}

impl HandLandmarks {
    /// Whether all 21 keypoints are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    /// Position of keypoint `idx`. Callers check [`Self::is_complete`] first.
    #[must_use]
    pub fn point(&self, idx: usize) -> Point {
        self.landmarks.get(idx).map(Keypoint::point).unwrap_or_default()
    }

    /// Position of the wrist.
    #[must_use]
    pub fn wrist(&self) -> Point {
        self.point(index::WRIST)
    }
}

/// One frame of tracker output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerFrame {
    /// Capture time in milliseconds.
    pub timestamp_ms: u64,
    /// All hands detected in this frame.
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

/// A tracker frame resolved into the trigger hand and the target hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPair {
    /// Capture time in milliseconds.
    pub timestamp_ms: u64,
    /// The hand whose fist drives recording.
    pub trigger: Option<HandLandmarks>,
    /// The hand whose motion is evaluated.
    pub target: Option<HandLandmarks>,
}

impl HandPair {
    /// Resolve a tracker frame.
    ///
    /// When `mirrored` is set, tracker labels are swapped: a mirrored feed
    /// reports the operator's right hand as "Left". The first detection for
    /// each side wins.
    #[must_use]
    pub fn resolve(frame: &TrackerFrame, trigger_hand: Handedness, mirrored: bool) -> Self {
        let mut trigger = None;
        let mut target = None;

        for hand in &frame.hands {
            let side = if mirrored {
                hand.handedness.opposite()
            } else {
                hand.handedness
            };
            let slot = if side == trigger_hand {
                &mut trigger
            } else {
                &mut target
            };
            if slot.is_none() {
                *slot = Some(HandLandmarks {
                    handedness: side,
                    landmarks: hand.landmarks.clone(),
                });
            }
        }

        Self {
            timestamp_ms: frame.timestamp_ms,
            trigger,
            target,
        }
    }

    /// Whether both hands are in view.
    #[must_use]
    pub fn both_present(&self) -> bool {
        self.trigger.is_some() && self.target.is_some()
    }
}
