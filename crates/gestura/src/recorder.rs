//! Motion recording and sample construction.
//!
//! The [`MotionRecorder`] accumulates the target hand's wrist positions while
//! a trigger is held. [`MotionSample::from_frames`] turns a finished buffer
//! into the fixed-shape feature row used for matching and customization.

use serde::{Deserialize, Serialize};

use crate::classifier::FingerState;
use crate::landmark::Point;

/// One frame of the target hand captured during recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Capture time in milliseconds.
    pub timestamp_ms: u64,
    /// Wrist position.
    pub wrist: Point,
    /// Finger state classified for this frame.
    pub fingers: FingerState,
}

/// Raw trajectory buffer for the current recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionRecorder {
    frames: Vec<RecordedFrame>,
}

impl MotionRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    pub fn push(&mut self, frame: RecordedFrame) {
        self.frames.push(frame);
    }

    /// Drop all buffered frames.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Number of buffered frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The buffered frames, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Take the buffered frames, leaving the recorder empty.
    pub fn take(&mut self) -> Vec<RecordedFrame> {
        std::mem::take(&mut self.frames)
    }
}

/// Three-point moving average. The first and last points use themselves in
/// place of the missing neighbour. Paths of two points or fewer are returned
/// unchanged.
#[must_use]
pub fn smooth(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    (0..points.len())
        .map(|i| {
            let current = points[i];
            let prev = if i == 0 { current } else { points[i - 1] };
            let next = points.get(i + 1).copied().unwrap_or(current);
            Point::new(
                (prev.x + current.x + next.x) / 3.0,
                (prev.y + current.y + next.y) / 3.0,
            )
        })
        .collect()
}

/// A finished recording, reduced to its matching features.
///
/// Field names follow the tabular dataset consumed by the preparation
/// pipeline. Finger vectors serialize as five 0/1 integers and the axis flags
/// as 0/1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Gesture this sample was recorded for.
    pub pose_label: String,
    /// Sequence number within the recording session, starting at 1.
    pub instance_id: u64,
    /// Operator's left hand fingers when recording started.
    pub left_finger_state: FingerState,
    /// Operator's right hand fingers when recording started.
    pub right_finger_state: FingerState,
    /// Smoothed start x.
    pub motion_x_start: f64,
    /// Smoothed start y.
    pub motion_y_start: f64,
    /// Smoothed midpoint x.
    pub motion_x_mid: f64,
    /// Smoothed midpoint y.
    pub motion_y_mid: f64,
    /// Smoothed end x.
    pub motion_x_end: f64,
    /// Smoothed end y.
    pub motion_y_end: f64,
    /// Horizontal motion dominates (ties count as horizontal).
    #[serde(with = "flag")]
    pub main_axis_x: bool,
    /// Vertical motion strictly dominates.
    #[serde(with = "flag")]
    pub main_axis_y: bool,
    /// End x minus start x.
    pub delta_x: f64,
    /// End y minus start y.
    pub delta_y: f64,
}

impl MotionSample {
    /// Build a sample from recorded frames. Returns `None` for an empty buffer.
    #[must_use]
    pub fn from_frames(
        pose_label: impl Into<String>,
        instance_id: u64,
        left: FingerState,
        right: FingerState,
        frames: &[RecordedFrame],
    ) -> Option<Self> {
        let path: Vec<Point> = frames.iter().map(|f| f.wrist).collect();
        let smoothed = smooth(&path);

        let start = *smoothed.first()?;
        let mid = smoothed[smoothed.len() / 2];
        let end = *smoothed.last()?;
        let delta_x = end.x - start.x;
        let delta_y = end.y - start.y;

        Some(Self {
            pose_label: pose_label.into(),
            instance_id,
            left_finger_state: left,
            right_finger_state: right,
            motion_x_start: start.x,
            motion_y_start: start.y,
            motion_x_mid: mid.x,
            motion_y_mid: mid.y,
            motion_x_end: end.x,
            motion_y_end: end.y,
            main_axis_x: delta_x.abs() >= delta_y.abs(),
            main_axis_y: delta_y.abs() > delta_x.abs(),
            delta_x,
            delta_y,
        })
    }

    /// Smoothed start, middle and end positions.
    #[must_use]
    pub fn waypoints(&self) -> [Point; 3] {
        [
            Point::new(self.motion_x_start, self.motion_y_start),
            Point::new(self.motion_x_mid, self.motion_y_mid),
            Point::new(self.motion_x_end, self.motion_y_end),
        ]
    }

    /// Length of the start-to-end displacement.
    #[must_use]
    pub fn travel(&self) -> f64 {
        self.delta_x.hypot(self.delta_y)
    }
}

mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(raw != 0.0)
    }
}
