//! Gesture matching.
//!
//! A [`Matcher`] compares either a recorded frame sequence (practice) or a
//! reduced [`MotionSample`] (customization) against a [`GestureTemplate`].
//! The result is always a [`MatchOutcome`]; a failed match is feedback for the
//! operator, not an error.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::classifier::FingerState;
use crate::config::{CaptureConfig, Config, MatcherConfig};
use crate::landmark::{Handedness, TrackerFrame};
use crate::recorder::{MotionSample, RecordedFrame};
use crate::template::{Axis, Direction, GestureTemplate, TemplateMotion};
use crate::trigger::{advance, TriggerEvent, TriggerSession, TriggerSettings};

/// Why a match attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchFailure {
    /// The majority finger posture differs from the template.
    WrongFingers {
        /// Majority posture observed.
        got: FingerState,
        /// Posture the template expects.
        expected: FingerState,
    },
    /// A static gesture was not held long enough.
    HoldLonger {
        /// How long the posture was held.
        held_ms: u64,
        /// Required hold.
        required_ms: u64,
    },
    /// Too few frames of a static hold had the expected fingers.
    InconsistentFingers {
        /// Percentage of matching frames, rounded down.
        percent: u32,
        /// Required percentage.
        required: u32,
    },
    /// The wrist drifted during a static hold.
    TooMuchMovement {
        /// Largest distance from the starting position.
        drift: f64,
        /// Allowed distance.
        max: f64,
    },
    /// Too few frames to judge a motion.
    TooFewFrames {
        /// Frames available.
        frames: usize,
        /// Frames required.
        required: usize,
    },
    /// The wrist barely moved.
    NotEnoughMotion {
        /// Start-to-end distance.
        travel: f64,
        /// Required distance.
        required: f64,
    },
    /// Motion ran along the wrong axis.
    WrongAxis {
        /// Dominant axis observed.
        moved: Axis,
        /// Axis the template expects.
        expected: Axis,
    },
    /// Horizontal motion went the wrong way.
    WrongHorizontal {
        /// Direction observed.
        moved: Direction,
        /// Direction expected.
        expected: Direction,
    },
    /// Vertical motion went the wrong way.
    WrongVertical {
        /// Direction observed.
        moved: Direction,
        /// Direction expected.
        expected: Direction,
    },
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongFingers { got, expected } => {
                write!(f, "Wrong fingers: got {got}, expected {expected}")
            }
            Self::HoldLonger {
                held_ms,
                required_ms,
            } => write!(
                f,
                "Hold longer: held {:.1}s, need {:.1}s",
                *held_ms as f64 / 1000.0,
                *required_ms as f64 / 1000.0
            ),
            Self::InconsistentFingers { percent, required } => write!(
                f,
                "Inconsistent fingers: only {percent}% match (need {required}%)"
            ),
            Self::TooMuchMovement { drift, max } => {
                write!(f, "Too much movement: {drift:.3} (max {max:.3})")
            }
            Self::TooFewFrames { frames, required } => {
                write!(f, "Too few motion frames: {frames} (need {required})")
            }
            Self::NotEnoughMotion { travel, required } => {
                write!(f, "Not enough motion: {travel:.3} (need {required:.3})")
            }
            Self::WrongAxis { moved, expected } => write!(
                f,
                "Wrong main direction: moved {moved}, expected {expected}"
            ),
            Self::WrongHorizontal { moved, expected } => write!(
                f,
                "Wrong horizontal direction: moved {moved}, expected {expected}"
            ),
            Self::WrongVertical { moved, expected } => write!(
                f,
                "Wrong vertical direction: moved {moved}, expected {expected}"
            ),
        }
    }
}

/// Result of evaluating an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The attempt matched.
    Success {
        /// Feedback naming the gesture.
        message: String,
    },
    /// The attempt did not match.
    Failure(MatchFailure),
}

impl MatchOutcome {
    /// Whether the attempt matched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Feedback line for the operator.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Success { message } => message.clone(),
            Self::Failure(failure) => failure.to_string(),
        }
    }
}

impl From<MatchFailure> for MatchOutcome {
    fn from(failure: MatchFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Evaluates attempts against templates.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    thresholds: MatcherConfig,
    mirrored: bool,
    target_hand: Handedness,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default(), &CaptureConfig::default())
    }
}

impl Matcher {
    /// Create a matcher. The capture settings decide which hand is evaluated
    /// and whether horizontal motion is mirrored.
    #[must_use]
    pub fn new(thresholds: MatcherConfig, capture: &CaptureConfig) -> Self {
        Self {
            thresholds,
            mirrored: capture.mirrored,
            target_hand: capture.trigger_hand.opposite(),
        }
    }

    /// Create a matcher from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.matcher.clone(), &config.capture)
    }

    /// Evaluate a recorded target-hand frame sequence.
    #[must_use]
    pub fn evaluate_sequence(
        &self,
        template: &GestureTemplate,
        frames: &[RecordedFrame],
    ) -> MatchOutcome {
        let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
            return MatchFailure::TooFewFrames {
                frames: 0,
                required: self.thresholds.min_motion_frames.max(1),
            }
            .into();
        };

        let observed = FingerState::majority(frames.iter().map(|f| &f.fingers));
        if observed != template.fingers {
            return MatchFailure::WrongFingers {
                got: observed,
                expected: template.fingers,
            }
            .into();
        }

        match template.motion {
            TemplateMotion::Static => {
                let held_ms = last.timestamp_ms.saturating_sub(first.timestamp_ms);
                if held_ms < self.thresholds.static_hold_ms {
                    return MatchFailure::HoldLonger {
                        held_ms,
                        required_ms: self.thresholds.static_hold_ms,
                    }
                    .into();
                }

                let matching = frames
                    .iter()
                    .filter(|f| f.fingers == template.fingers)
                    .count();
                let required = self.thresholds.min_agreement_percent;
                if matching * 100 < required as usize * frames.len() {
                    return MatchFailure::InconsistentFingers {
                        percent: percent(matching, frames.len()),
                        required,
                    }
                    .into();
                }

                let drift = frames
                    .iter()
                    .map(|f| first.wrist.distance(&f.wrist))
                    .fold(0.0, f64::max);
                if let Some(failure) = self.check_drift(drift) {
                    return failure.into();
                }

                self.success_static(template, percent(matching, frames.len()), held_ms)
            }
            TemplateMotion::Dynamic { axis, .. } => {
                if frames.len() < self.thresholds.min_motion_frames {
                    return MatchFailure::TooFewFrames {
                        frames: frames.len(),
                        required: self.thresholds.min_motion_frames,
                    }
                    .into();
                }
                let dx = last.wrist.x - first.wrist.x;
                let dy = last.wrist.y - first.wrist.y;
                self.check_motion(template, axis, dx, dy)
            }
        }
    }

    /// Evaluate a reduced sample. The sample's target-hand fingers are
    /// compared directly; static templates check drift across the three
    /// waypoints since no duration is available.
    #[must_use]
    pub fn evaluate_sample(
        &self,
        template: &GestureTemplate,
        sample: &MotionSample,
    ) -> MatchOutcome {
        let observed = match self.target_hand {
            Handedness::Left => sample.left_finger_state,
            Handedness::Right => sample.right_finger_state,
        };
        if observed != template.fingers {
            return MatchFailure::WrongFingers {
                got: observed,
                expected: template.fingers,
            }
            .into();
        }

        match template.motion {
            TemplateMotion::Static => {
                let [start, mid, end] = sample.waypoints();
                let drift = start.distance(&mid).max(start.distance(&end));
                if let Some(failure) = self.check_drift(drift) {
                    return failure.into();
                }
                self.success_static(template, 100, 0)
            }
            TemplateMotion::Dynamic { axis, .. } => {
                self.check_motion(template, axis, sample.delta_x, sample.delta_y)
            }
        }
    }

    fn check_drift(&self, drift: f64) -> Option<MatchFailure> {
        (drift > self.thresholds.max_drift).then(|| MatchFailure::TooMuchMovement {
            drift,
            max: self.thresholds.max_drift,
        })
    }

    fn check_motion(
        &self,
        template: &GestureTemplate,
        expected_axis: Axis,
        dx: f64,
        dy: f64,
    ) -> MatchOutcome {
        let travel = dx.hypot(dy);
        if travel < self.thresholds.min_travel {
            return MatchFailure::NotEnoughMotion {
                travel,
                required: self.thresholds.min_travel,
            }
            .into();
        }

        let moved_axis = if dx.abs() >= dy.abs() {
            Axis::Horizontal
        } else {
            Axis::Vertical
        };
        if moved_axis != expected_axis {
            return MatchFailure::WrongAxis {
                moved: moved_axis,
                expected: expected_axis,
            }
            .into();
        }

        if let Some(expected) = template.expected_direction() {
            let moved = match expected_axis {
                Axis::Horizontal => {
                    // The image is mirrored: moving right shrinks x
                    let right = if self.mirrored { dx < 0.0 } else { dx > 0.0 };
                    if right {
                        Direction::Right
                    } else {
                        Direction::Left
                    }
                }
                Axis::Vertical => {
                    if dy > 0.0 {
                        Direction::Down
                    } else {
                        Direction::Up
                    }
                }
            };
            if moved != expected {
                return match expected_axis {
                    Axis::Horizontal => MatchFailure::WrongHorizontal { moved, expected },
                    Axis::Vertical => MatchFailure::WrongVertical { moved, expected },
                }
                .into();
            }
        }

        debug!(pose = %template.pose_label, travel, "Motion matched");
        MatchOutcome::Success {
            message: format!("Perfect {}! Moved {travel:.3}", template.pose_label),
        }
    }

    #[allow(clippy::unused_self)]
    fn success_static(
        &self,
        template: &GestureTemplate,
        agreement: u32,
        held_ms: u64,
    ) -> MatchOutcome {
        debug!(pose = %template.pose_label, agreement, held_ms, "Static hold matched");
        let message = if held_ms > 0 {
            format!(
                "Perfect static {}! {agreement}% accuracy, {:.1}s hold",
                template.pose_label,
                held_ms as f64 / 1000.0
            )
        } else {
            format!("Perfect static {}!", template.pose_label)
        };
        MatchOutcome::Success { message }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part * 100) / total) as u32
}

/// Running tally of practice attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PracticeStats {
    /// Successful attempts.
    pub correct: u32,
    /// Failed attempts.
    pub wrong: u32,
}

impl PracticeStats {
    /// Total attempts.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.correct + self.wrong
    }

    /// Share of successful attempts, in percent.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        percent(self.correct as usize, self.attempts() as usize)
    }
}

/// What a practice frame produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PracticeEvent {
    /// The trigger fist closed; an attempt is being recorded.
    Started,
    /// An attempt finished and was evaluated.
    Attempt(MatchOutcome),
    /// A hand left the frame mid-attempt.
    HandsLost,
}

/// Live practice against one template.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    template: GestureTemplate,
    matcher: Matcher,
    trigger: TriggerSession,
    stats: PracticeStats,
}

impl PracticeSession {
    /// Start practicing `template`. Attempts are not subject to the
    /// recording minimum; only the matcher judges them.
    #[must_use]
    pub fn new(template: GestureTemplate, matcher: Matcher, settings: TriggerSettings) -> Self {
        let settings = TriggerSettings {
            min_frames: 1,
            ..settings
        };
        let trigger = TriggerSession::new(template.pose_label.clone(), settings);
        Self {
            template,
            matcher,
            trigger,
            stats: PracticeStats::default(),
        }
    }

    /// The template being practiced.
    #[must_use]
    pub fn template(&self) -> &GestureTemplate {
        &self.template
    }

    /// Attempts so far.
    #[must_use]
    pub fn stats(&self) -> PracticeStats {
        self.stats
    }

    /// Feed one tracker frame.
    pub fn handle(&mut self, frame: &TrackerFrame) -> Option<PracticeEvent> {
        let (next, event) = advance(std::mem::take(&mut self.trigger), frame);
        self.trigger = next;

        let outcome = match event? {
            TriggerEvent::Started => return Some(PracticeEvent::Started),
            TriggerEvent::HandsLost => return Some(PracticeEvent::HandsLost),
            TriggerEvent::Completed(recording) => self
                .matcher
                .evaluate_sequence(&self.template, &recording.frames),
            TriggerEvent::TooShort { frames, required } => {
                MatchFailure::TooFewFrames { frames, required }.into()
            }
        };

        if outcome.is_success() {
            self.stats.correct += 1;
        } else {
            self.stats.wrong += 1;
        }
        debug!(
            pose = %self.template.pose_label,
            success = outcome.is_success(),
            correct = self.stats.correct,
            wrong = self.stats.wrong,
            "Practice attempt"
        );
        Some(PracticeEvent::Attempt(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Point;
    use crate::template::TemplateLibrary;
    use crate::trigger::fixtures::gesture;

    fn template(name: &str) -> GestureTemplate {
        TemplateLibrary::builtin().get(name).unwrap().clone()
    }

    fn bits(b: [u8; 5]) -> FingerState {
        FingerState::from_bits(b)
    }

    /// `n` frames spread evenly over `span_ms`, wrist moving by (dx, dy) in total.
    fn frames(
        n: usize,
        span_ms: u64,
        fingers: FingerState,
        dx: f64,
        dy: f64,
    ) -> Vec<RecordedFrame> {
        let last = (n - 1).max(1) as f64;
        (0..n)
            .map(|i| {
                let t = i as f64 / last;
                RecordedFrame {
                    timestamp_ms: (span_ms as f64 * t).round() as u64,
                    wrist: Point::new(0.5 + dx * t, 0.5 + dy * t),
                    fingers,
                }
            })
            .collect()
    }

    fn failure(outcome: MatchOutcome) -> MatchFailure {
        match outcome {
            MatchOutcome::Failure(f) => f,
            MatchOutcome::Success { message } => panic!("unexpected success: {message}"),
        }
    }

    #[test]
    fn test_static_home_succeeds() {
        let home = template("home");
        let seq = frames(30, 1100, bits([1, 0, 0, 0, 0]), 0.005, 0.005);

        let outcome = Matcher::default().evaluate_sequence(&home, &seq);
        assert!(outcome.is_success());
        assert!(outcome.message().contains("home"));
    }

    #[test]
    fn test_static_agreement_threshold() {
        let home = template("home");
        let good = bits([1, 0, 0, 0, 0]);
        let bad = bits([1, 1, 0, 0, 0]);

        // 70 of 100 frames agree, held exactly 1000 ms
        let mut seq = frames(100, 1000, good, 0.0, 0.0);
        for f in seq.iter_mut().skip(70) {
            f.fingers = bad;
        }
        assert!(Matcher::default().evaluate_sequence(&home, &seq).is_success());

        // 69 of 100
        seq[69].fingers = bad;
        let outcome = Matcher::default().evaluate_sequence(&home, &seq);
        assert_eq!(
            failure(outcome.clone()),
            MatchFailure::InconsistentFingers {
                percent: 69,
                required: 70
            }
        );
        assert!(outcome.message().starts_with("Inconsistent fingers"));
    }

    #[test]
    fn test_static_hold_too_short() {
        let seq = frames(20, 999, bits([1, 0, 0, 0, 0]), 0.0, 0.0);
        let outcome = Matcher::default().evaluate_sequence(&template("home"), &seq);
        assert_eq!(
            failure(outcome),
            MatchFailure::HoldLonger {
                held_ms: 999,
                required_ms: 1000
            }
        );
    }

    #[test]
    fn test_static_drift() {
        let seq = frames(30, 1200, bits([1, 1, 1, 1, 1]), 0.06, 0.0);
        let outcome = Matcher::default().evaluate_sequence(&template("end"), &seq);
        assert!(matches!(failure(outcome), MatchFailure::TooMuchMovement { .. }));

        let seq = frames(30, 1200, bits([1, 1, 1, 1, 1]), 0.04, 0.0);
        assert!(Matcher::default()
            .evaluate_sequence(&template("end"), &seq)
            .is_success());
    }

    #[test]
    fn test_wrong_fingers_uses_majority() {
        let mut seq = frames(10, 500, bits([0, 1, 1, 0, 0]), -0.1, 0.0);
        // A minority of noisy frames does not change the verdict
        seq[0].fingers = bits([1, 1, 1, 0, 0]);
        seq[1].fingers = bits([1, 1, 1, 0, 0]);
        assert!(Matcher::default()
            .evaluate_sequence(&template("next_slide"), &seq)
            .is_success());

        let outcome = Matcher::default().evaluate_sequence(&template("zoom_in"), &seq);
        let msg = outcome.message();
        assert!(msg.starts_with("Wrong fingers"));
        assert!(msg.contains("[0,1,1,0,0]"));
        assert!(msg.contains("[1,1,1,0,0]"));
    }

    #[test]
    fn test_zoom_in_up_and_down() {
        let zoom_in = template("zoom_in");
        let fingers = bits([1, 1, 1, 0, 0]);

        let up = frames(10, 330, fingers, 0.0, -0.2);
        assert!(Matcher::default().evaluate_sequence(&zoom_in, &up).is_success());

        let down = frames(10, 330, fingers, 0.0, 0.2);
        let outcome = Matcher::default().evaluate_sequence(&zoom_in, &down);
        assert_eq!(
            failure(outcome.clone()),
            MatchFailure::WrongVertical {
                moved: Direction::Down,
                expected: Direction::Up
            }
        );
        assert!(outcome
            .message()
            .to_lowercase()
            .starts_with("wrong vertical direction"));
    }

    #[test]
    fn test_horizontal_direction_is_mirrored() {
        let fingers = bits([0, 1, 1, 0, 0]);
        // Raw x decreasing is the operator moving right
        let raw_left = frames(10, 330, fingers, -0.15, 0.0);

        let matcher = Matcher::default();
        assert!(matcher
            .evaluate_sequence(&template("next_slide"), &raw_left)
            .is_success());
        assert_eq!(
            failure(matcher.evaluate_sequence(&template("previous_slide"), &raw_left)),
            MatchFailure::WrongHorizontal {
                moved: Direction::Right,
                expected: Direction::Left
            }
        );

        let unmirrored = Matcher::new(
            MatcherConfig::default(),
            &CaptureConfig {
                mirrored: false,
                ..CaptureConfig::default()
            },
        );
        assert!(unmirrored
            .evaluate_sequence(&template("previous_slide"), &raw_left)
            .is_success());
    }

    #[test]
    fn test_wrong_axis_and_tie_break() {
        let fingers = bits([1, 1, 0, 0, 0]);
        // |dx| == |dy| counts as horizontal
        let diagonal = frames(10, 330, fingers, -0.1, -0.1);

        assert!(Matcher::default()
            .evaluate_sequence(&template("rotate_right"), &diagonal)
            .is_success());
        let outcome = Matcher::default().evaluate_sequence(&template("rotate_up"), &diagonal);
        assert_eq!(
            failure(outcome.clone()),
            MatchFailure::WrongAxis {
                moved: Axis::Horizontal,
                expected: Axis::Vertical
            }
        );
        assert_eq!(
            outcome.message(),
            "Wrong main direction: moved horizontal, expected vertical"
        );
    }

    #[test]
    fn test_not_enough_motion_and_too_few_frames() {
        let fingers = bits([1, 1, 0, 0, 0]);
        let small = frames(10, 330, fingers, 0.02, 0.0);
        assert!(matches!(
            failure(Matcher::default().evaluate_sequence(&template("rotate_left"), &small)),
            MatchFailure::NotEnoughMotion { .. }
        ));

        let short = frames(2, 66, fingers, -0.2, 0.0);
        assert_eq!(
            failure(Matcher::default().evaluate_sequence(&template("rotate_right"), &short)),
            MatchFailure::TooFewFrames {
                frames: 2,
                required: 3
            }
        );

        assert!(matches!(
            failure(Matcher::default().evaluate_sequence(&template("rotate_right"), &[])),
            MatchFailure::TooFewFrames { frames: 0, .. }
        ));
    }

    #[test]
    fn test_evaluate_sample() {
        let fingers = bits([1, 1, 1, 0, 0]);
        let recorded = frames(15, 500, fingers, 0.0, -0.2);
        let sample =
            MotionSample::from_frames("zoom_in", 1, FingerState::CLOSED, fingers, &recorded)
                .unwrap();

        let matcher = Matcher::default();
        assert!(matcher.evaluate_sample(&template("zoom_in"), &sample).is_success());
        assert!(matches!(
            failure(matcher.evaluate_sample(&template("zoom_out"), &sample)),
            MatchFailure::WrongVertical { .. }
        ));
        assert!(matches!(
            failure(matcher.evaluate_sample(&template("rotate_up"), &sample)),
            MatchFailure::WrongFingers { .. }
        ));
    }

    #[test]
    fn test_evaluate_sample_static_drift() {
        let fingers = bits([1, 0, 0, 0, 0]);
        let still = frames(15, 500, fingers, 0.01, 0.0);
        let sample =
            MotionSample::from_frames("home", 1, FingerState::CLOSED, fingers, &still).unwrap();
        assert!(Matcher::default()
            .evaluate_sample(&template("home"), &sample)
            .is_success());

        let moving = frames(15, 500, fingers, 0.2, 0.0);
        let sample =
            MotionSample::from_frames("home", 1, FingerState::CLOSED, fingers, &moving).unwrap();
        assert!(matches!(
            failure(Matcher::default().evaluate_sample(&template("home"), &sample)),
            MatchFailure::TooMuchMovement { .. }
        ));
    }

    #[test]
    fn test_practice_session_scenarios() {
        let matcher = Matcher::default();
        let settings = TriggerSettings::default();

        // Static home: 34 frames at 33 ms is just over one second
        let mut practice =
            PracticeSession::new(template("home"), matcher.clone(), settings.clone());
        let events: Vec<_> = gesture(bits([1, 0, 0, 0, 0]), 34, 0.0002, 0.0, 33)
            .iter()
            .filter_map(|f| practice.handle(f))
            .collect();
        assert_eq!(events[0], PracticeEvent::Started);
        let PracticeEvent::Attempt(outcome) = &events[1] else {
            panic!("expected an attempt");
        };
        assert!(outcome.is_success(), "{}", outcome.message());
        assert!(outcome.message().contains("home"));

        // Dynamic zoom_in: upwards succeeds, downwards fails
        let mut practice = PracticeSession::new(template("zoom_in"), matcher, settings);
        for f in gesture(bits([1, 1, 1, 0, 0]), 10, 0.0, -0.02, 33) {
            practice.handle(&f);
        }
        for f in gesture(bits([1, 1, 1, 0, 0]), 10, 0.0, 0.02, 33) {
            if let Some(PracticeEvent::Attempt(outcome)) = practice.handle(&f) {
                assert!(outcome.message().starts_with("Wrong vertical direction"));
            }
        }
        assert_eq!(practice.stats(), PracticeStats { correct: 1, wrong: 1 });
        assert_eq!(practice.stats().accuracy_percent(), 50);
    }

    #[test]
    fn test_practice_stats_empty() {
        let stats = PracticeStats::default();
        assert_eq!(stats.attempts(), 0);
        assert_eq!(stats.accuracy_percent(), 0);
    }

    #[test]
    fn test_failure_serializes_with_reason_tag() {
        let json = serde_json::to_value(MatchOutcome::Failure(MatchFailure::TooFewFrames {
            frames: 1,
            required: 3,
        }))
        .unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["reason"], "too_few_frames");
    }
}
