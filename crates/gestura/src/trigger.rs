//! Trigger-driven recording state machine.
//!
//! The operator closes a fist with the trigger hand to start recording and
//! opens it to stop. While recording, the target hand's wrist trajectory is
//! buffered. Releasing the fist processes the buffer into a [`MotionSample`].
//!
//! All state lives in a [`TriggerSession`] owned by the caller, and
//! [`advance`] is a pure step function over it.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::classifier::{finger_state, FingerState};
use crate::config::{CaptureConfig, ClassifierConfig};
use crate::landmark::{HandLandmarks, HandPair, Handedness, TrackerFrame};
use crate::recorder::{MotionRecorder, MotionSample, RecordedFrame};

/// Recording phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the trigger fist.
    #[default]
    Wait,
    /// Buffering the target hand's motion.
    Record,
    /// Turning the buffer into a sample. Never observed between frames.
    Process,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "wait"),
            Self::Record => write!(f, "record"),
            Self::Process => write!(f, "process"),
        }
    }
}

/// Settings a session needs to interpret frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSettings {
    /// Hand whose fist drives recording.
    pub trigger_hand: Handedness,
    /// Whether tracker labels are mirrored.
    pub mirrored: bool,
    /// Minimum buffered frames for a sample.
    pub min_frames: usize,
    /// Classifier thresholds.
    pub classifier: ClassifierConfig,
}

impl TriggerSettings {
    /// Build settings from the loaded configuration sections.
    #[must_use]
    pub fn from_config(capture: &CaptureConfig, classifier: &ClassifierConfig) -> Self {
        Self {
            trigger_hand: capture.trigger_hand,
            mirrored: capture.mirrored,
            min_frames: capture.min_frames,
            classifier: classifier.clone(),
        }
    }
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default(), &ClassifierConfig::default())
    }
}

/// A completed recording: the reduced sample plus the raw frames behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Feature row built from the frames.
    pub sample: MotionSample,
    /// Target hand frames, oldest first.
    pub frames: Vec<RecordedFrame>,
}

/// Something observable happened while processing a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    /// The trigger fist closed and recording began.
    Started,
    /// The trigger fist opened and a sample was produced.
    Completed(Recording),
    /// The trigger fist opened but too few frames were buffered.
    TooShort {
        /// Frames that were buffered.
        frames: usize,
        /// Frames required.
        required: usize,
    },
    /// A hand left the frame during recording.
    HandsLost,
}

/// Recording state for one capture client.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSession {
    pose_label: String,
    settings: TriggerSettings,
    phase: Phase,
    prev_fist: bool,
    recorder: MotionRecorder,
    left_snapshot: FingerState,
    right_snapshot: FingerState,
    next_instance: u64,
}

impl TriggerSession {
    /// Start a session recording samples labelled `pose_label`.
    #[must_use]
    pub fn new(pose_label: impl Into<String>, settings: TriggerSettings) -> Self {
        Self {
            pose_label: pose_label.into(),
            settings,
            phase: Phase::Wait,
            prev_fist: false,
            recorder: MotionRecorder::new(),
            left_snapshot: FingerState::CLOSED,
            right_snapshot: FingerState::CLOSED,
            next_instance: 1,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Label attached to produced samples.
    #[must_use]
    pub fn pose_label(&self) -> &str {
        &self.pose_label
    }

    /// Frames buffered for the recording in progress.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.recorder.len()
    }

    /// Instance id the next sample will receive.
    #[must_use]
    pub fn next_instance(&self) -> u64 {
        self.next_instance
    }

    /// Discard any recording in progress and return to waiting.
    pub fn reset(&mut self) {
        self.phase = Phase::Wait;
        self.prev_fist = false;
        self.recorder.clear();
    }

    fn snapshot(&mut self, trigger: FingerState, target: FingerState) {
        let (left, right) = match self.settings.trigger_hand {
            Handedness::Left => (trigger, target),
            Handedness::Right => (target, trigger),
        };
        self.left_snapshot = left;
        self.right_snapshot = right;
    }

    /// Close the recording. The phase is `Process` only for the duration
    /// of this call and is back to `Wait` when it returns.
    fn process(&mut self) -> TriggerEvent {
        self.phase = Phase::Process;
        let frames = self.recorder.take();
        let required = self.settings.min_frames;
        self.phase = Phase::Wait;

        let sample = (frames.len() >= required)
            .then(|| {
                MotionSample::from_frames(
                    self.pose_label.clone(),
                    self.next_instance,
                    self.left_snapshot,
                    self.right_snapshot,
                    &frames,
                )
            })
            .flatten();
        let Some(sample) = sample else {
            debug!(frames = frames.len(), required, "Recording too short");
            return TriggerEvent::TooShort {
                frames: frames.len(),
                required,
            };
        };

        debug!(
            pose = %self.pose_label,
            instance = self.next_instance,
            frames = frames.len(),
            "Recording completed"
        );
        self.next_instance += 1;
        TriggerEvent::Completed(Recording { sample, frames })
    }
}

impl Default for TriggerSession {
    fn default() -> Self {
        Self::new(String::new(), TriggerSettings::default())
    }
}

/// Feed one tracker frame to a session.
///
/// Returns the updated session and the event the frame produced, if any.
#[must_use]
pub fn advance(
    mut session: TriggerSession,
    frame: &TrackerFrame,
) -> (TriggerSession, Option<TriggerEvent>) {
    let pair = HandPair::resolve(frame, session.settings.trigger_hand, session.settings.mirrored);

    let (Some(trigger), Some(target)) = (&pair.trigger, &pair.target) else {
        let was_recording = session.phase == Phase::Record;
        session.reset();
        if was_recording {
            debug!(timestamp_ms = frame.timestamp_ms, "Hands lost during recording");
            return (session, Some(TriggerEvent::HandsLost));
        }
        return (session, None);
    };

    let trigger_fingers = finger_state(trigger, &session.settings.classifier);
    let target_fingers = finger_state(target, &session.settings.classifier);
    let fist = trigger_fingers.is_fist();
    let prev_fist = session.prev_fist;
    session.prev_fist = fist;

    trace!(
        timestamp_ms = frame.timestamp_ms,
        phase = %session.phase,
        fist,
        trigger = %trigger_fingers,
        target = %target_fingers,
        "Frame"
    );

    // `process` hands back a session in `Wait`, so `Process` is never seen here
    let event = match session.phase {
        Phase::Wait | Phase::Process if fist && !prev_fist => {
            session.phase = Phase::Record;
            session.recorder.clear();
            session.snapshot(trigger_fingers, target_fingers);
            debug!(pose = %session.pose_label, "Recording started");
            Some(TriggerEvent::Started)
        }
        Phase::Wait | Phase::Process => None,
        Phase::Record => {
            session.recorder.push(record(target, target_fingers, frame.timestamp_ms));
            (!fist && prev_fist).then(|| session.process())
        }
    };

    (session, event)
}

fn record(target: &HandLandmarks, fingers: FingerState, timestamp_ms: u64) -> RecordedFrame {
    RecordedFrame {
        timestamp_ms,
        wrist: target.wrist(),
        fingers,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Tracker frame builders shared by tests.

    use crate::classifier::fixtures::hand_at;
    use crate::classifier::FingerState;
    use crate::landmark::{Handedness, TrackerFrame};

    pub(crate) const FIST: FingerState = FingerState([false; 5]);
    pub(crate) const OPEN: FingerState = FingerState([true; 5]);

    /// A mirrored frame: the operator's left (trigger) hand is labelled
    /// "Right" by the tracker and the target hand "Left".
    pub(crate) fn frame(
        t: u64,
        trigger: FingerState,
        target: FingerState,
        wx: f64,
        wy: f64,
    ) -> TrackerFrame {
        let mut trigger_hand = hand_at(trigger, 0.2, 0.6);
        trigger_hand.handedness = Handedness::Right;
        let mut target_hand = hand_at(target, wx, wy);
        target_hand.handedness = Handedness::Left;
        TrackerFrame {
            timestamp_ms: t,
            hands: vec![trigger_hand, target_hand],
        }
    }

    /// Frames for a complete gesture: one open frame, `n` fist frames with
    /// the target wrist moving by `(dx, dy)` per frame, then a release.
    /// The session buffers exactly `n` of them.
    pub(crate) fn gesture(
        target: FingerState,
        n: usize,
        dx: f64,
        dy: f64,
        frame_ms: u64,
    ) -> Vec<TrackerFrame> {
        let mut frames = vec![frame(0, OPEN, target, 0.6, 0.5)];
        for i in 0..n {
            let step = i as f64;
            frames.push(frame(
                (i as u64 + 1) * frame_ms,
                FIST,
                target,
                0.6 + dx * step,
                0.5 + dy * step,
            ));
        }
        let last = n.saturating_sub(1) as f64;
        frames.push(frame(
            (n as u64 + 1) * frame_ms,
            OPEN,
            target,
            0.6 + dx * last,
            0.5 + dy * last,
        ));
        frames
    }
}
