//! Finger-state classification.
//!
//! Turns one hand's 21 keypoints into a five-finger open/closed vector and a
//! palm orientation. Classification is a pure function of its input.
//!
//! Index through pinky are open when the fingertip sits above (smaller `y`)
//! its PIP joint. The thumb has no single robust signal across orientations,
//! so three independent checks are OR-ed together and then gated by a
//! position check relative to the palm facing:
//!
//! - tip far from the palm center,
//! - tip displaced from the thumb MCP on either axis,
//! - MCP–IP–tip angle close to straight.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::landmark::{index, HandLandmarks, Point};

/// Finger order used by [`FingerState`].
pub const FINGER_NAMES: [&str; 5] = ["thumb", "index", "middle", "ring", "pinky"];

/// Open/closed state of each finger, in thumb, index, middle, ring, pinky order.
///
/// Serialized as five 0/1 integers, which is how samples travel on the wire
/// and in the tabular artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[u8; 5]", try_from = "[u8; 5]")]
pub struct FingerState(pub [bool; 5]);

impl FingerState {
    /// All fingers closed.
    pub const CLOSED: Self = Self([false; 5]);

    /// Build from 0/1 bits; any non-zero value counts as open.
    #[must_use]
    pub fn from_bits(bits: [u8; 5]) -> Self {
        Self(bits.map(|b| b != 0))
    }

    /// The state as 0/1 bits.
    #[must_use]
    pub fn bits(&self) -> [u8; 5] {
        self.0.map(u8::from)
    }

    /// Whether finger `idx` is open.
    #[must_use]
    pub fn is_open(&self, idx: usize) -> bool {
        self.0.get(idx).copied().unwrap_or(false)
    }

    /// A closed fist: index, middle, ring and pinky all closed. The thumb is ignored.
    #[must_use]
    pub fn is_fist(&self) -> bool {
        self.0[1..].iter().all(|open| !open)
    }

    /// Per-finger majority vote over a set of states.
    ///
    /// Each bit is open when at least half of the states have it open, so a
    /// tie rounds up. An empty input yields all closed.
    #[must_use]
    pub fn majority<'a>(states: impl IntoIterator<Item = &'a FingerState>) -> Self {
        let mut counts = [0usize; 5];
        let mut total = 0usize;
        for state in states {
            total += 1;
            for (count, open) in counts.iter_mut().zip(state.0) {
                *count += usize::from(open);
            }
        }
        if total == 0 {
            return Self::CLOSED;
        }
        Self(counts.map(|count| count * 2 >= total))
    }
}

impl From<FingerState> for [u8; 5] {
    fn from(state: FingerState) -> Self {
        state.bits()
    }
}

impl TryFrom<[u8; 5]> for FingerState {
    type Error = String;

    fn try_from(bits: [u8; 5]) -> Result<Self, Self::Error> {
        if let Some(bad) = bits.iter().find(|b| **b > 1) {
            return Err(format!("finger state bits must be 0 or 1, got {bad}"));
        }
        Ok(Self::from_bits(bits))
    }
}

impl fmt::Display for FingerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e] = self.bits();
        write!(f, "[{a},{b},{c},{d},{e}]")
    }
}

/// Which way the palm faces, from the sign of the palm-edge cross product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PalmFacing {
    /// Cross product positive.
    Positive,
    /// Cross product zero or negative.
    Negative,
}

/// Classifier output for one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandPosture {
    /// Finger open/closed vector.
    pub fingers: FingerState,
    /// Palm orientation.
    pub palm: PalmFacing,
}

/// Classify one hand.
///
/// Hands with fewer than 21 keypoints classify as all fingers closed.
#[must_use]
pub fn classify(hand: &HandLandmarks, config: &ClassifierConfig) -> HandPosture {
    if !hand.is_complete() {
        return HandPosture {
            fingers: FingerState::CLOSED,
            palm: PalmFacing::Negative,
        };
    }

    // The cross product sign already differs between left and right hands
    // seen from the same side, so no separate handedness branch is needed.
    let palm = palm_facing(hand);
    let thumb = thumb_open(hand, palm, config);

    let above = |tip: usize, pip: usize| hand.point(tip).y < hand.point(pip).y;

    HandPosture {
        fingers: FingerState([
            thumb,
            above(index::INDEX_TIP, index::INDEX_PIP),
            above(index::MIDDLE_TIP, index::MIDDLE_PIP),
            above(index::RING_TIP, index::RING_PIP),
            above(index::PINKY_TIP, index::PINKY_PIP),
        ]),
        palm,
    }
}

/// Shorthand for `classify(hand, config).fingers`.
#[must_use]
pub fn finger_state(hand: &HandLandmarks, config: &ClassifierConfig) -> FingerState {
    classify(hand, config).fingers
}

fn palm_facing(hand: &HandLandmarks) -> PalmFacing {
    let wrist = hand.wrist();
    let middle = hand.point(index::MIDDLE_MCP);
    let pinky = hand.point(index::PINKY_MCP);

    let (v1x, v1y) = (middle.x - wrist.x, middle.y - wrist.y);
    let (v2x, v2y) = (pinky.x - wrist.x, pinky.y - wrist.y);
    let cross_z = v1x * v2y - v1y * v2x;

    if cross_z > 0.0 {
        PalmFacing::Positive
    } else {
        PalmFacing::Negative
    }
}

fn thumb_open(hand: &HandLandmarks, palm: PalmFacing, config: &ClassifierConfig) -> bool {
    let tip = hand.point(index::THUMB_TIP);
    let ip = hand.point(index::THUMB_IP);
    let mcp = hand.point(index::THUMB_MCP);

    let palm_center = hand
        .point(index::INDEX_MCP)
        .midpoint(&hand.point(index::PINKY_MCP));
    let distance_open = tip.distance(&palm_center) > config.thumb_palm_distance;

    let extension_open = (tip.x - mcp.x).abs() > config.thumb_extension_x
        || (tip.y - mcp.y).abs() > config.thumb_extension_y;

    let angle_open = joint_angle_deg(&mcp, &ip, &tip) > config.thumb_straight_angle_deg;

    let outward = match palm {
        PalmFacing::Positive => tip.x < ip.x,
        PalmFacing::Negative => tip.x > ip.x,
    };

    (distance_open || extension_open || angle_open) && outward
}

/// Angle at `vertex` between the rays to `a` and `b`, in degrees.
/// Degenerate (zero-length) rays give 0.
fn joint_angle_deg(a: &Point, vertex: &Point, b: &Point) -> f64 {
    let (v1x, v1y) = (a.x - vertex.x, a.y - vertex.y);
    let (v2x, v2y) = (b.x - vertex.x, b.y - vertex.y);

    let mag1 = v1x.hypot(v1y);
    let mag2 = v2x.hypot(v2y);
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    let cos = ((v1x * v2x + v1y * v2y) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
