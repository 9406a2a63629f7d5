//! Customization capture: the trigger session feeding the sample aggregator.
//!
//! A [`CaptureSession`] owns one [`TriggerSession`] and hands every completed
//! sample to a shared [`SampleAggregator`]. Once the aggregator has uploaded
//! its batch the session is closed and further frames are ignored.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::aggregator::{AggregateOutcome, SampleAggregator};
use crate::landmark::TrackerFrame;
use crate::recorder::MotionSample;
use crate::trigger::{advance, TriggerEvent, TriggerSession, TriggerSettings};

/// Something the operator should be told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Recording started.
    Started,
    /// A hand left the frame; the recording was discarded.
    HandsLost,
    /// The recording was too short to keep.
    TooShort {
        /// Frames buffered.
        frames: usize,
        /// Frames required.
        required: usize,
    },
    /// A sample was recorded and handed to the aggregator.
    Sample {
        /// The recorded sample.
        sample: MotionSample,
        /// What the aggregator did with it.
        outcome: AggregateOutcome,
    },
}

/// One customization capture client.
#[derive(Debug)]
pub struct CaptureSession {
    trigger: TriggerSession,
    aggregator: Arc<SampleAggregator>,
}

impl CaptureSession {
    /// Record samples labelled `pose_label` into `aggregator`.
    #[must_use]
    pub fn new(
        pose_label: impl Into<String>,
        settings: TriggerSettings,
        aggregator: Arc<SampleAggregator>,
    ) -> Self {
        Self {
            trigger: TriggerSession::new(pose_label, settings),
            aggregator,
        }
    }

    /// The aggregator samples go to.
    #[must_use]
    pub fn aggregator(&self) -> &SampleAggregator {
        &self.aggregator
    }

    /// Whether the batch was uploaded and the session closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.aggregator.is_complete()
    }

    /// Feed one tracker frame. Returns `None` for uneventful frames and after
    /// the session has closed.
    pub async fn handle(&mut self, frame: &TrackerFrame) -> Option<CaptureEvent> {
        if self.is_closed() {
            return None;
        }

        let (next, event) = advance(std::mem::take(&mut self.trigger), frame);
        self.trigger = next;

        match event? {
            TriggerEvent::Started => Some(CaptureEvent::Started),
            TriggerEvent::HandsLost => Some(CaptureEvent::HandsLost),
            TriggerEvent::TooShort { frames, required } => {
                Some(CaptureEvent::TooShort { frames, required })
            }
            TriggerEvent::Completed(recording) => {
                let sample = recording.sample;
                debug!(
                    instance = sample.instance_id,
                    frames = recording.frames.len(),
                    "Customization sample recorded"
                );
                let outcome = self.aggregator.add(sample.clone()).await;
                Some(CaptureEvent::Sample { sample, outcome })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::aggregator::Uploader;
    use crate::classifier::FingerState;
    use crate::error::Result;
    use crate::trigger::fixtures::gesture;
    use crate::upload::{CsvUploader, UploadReceipt, UploadRequest};

    #[derive(Debug, Default)]
    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Uploader for CountingUploader {
        async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UploadReceipt {
                raw_file: "raw.csv".into(),
                master_file: "master.csv".into(),
                rows: request.samples.len(),
            })
        }
    }

    async fn perform(session: &mut CaptureSession, n: usize) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        for frame in gesture(FingerState::from_bits([1, 0, 0, 0, 0]), n, 0.0, 0.0, 40) {
            if let Some(event) = session.handle(&frame).await {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn test_five_samples_upload_once_and_close() {
        let uploader = Arc::new(CountingUploader::default());
        let aggregator = Arc::new(SampleAggregator::new("7", "Home", 5, uploader.clone()));
        let mut session = CaptureSession::new("home", TriggerSettings::default(), aggregator);

        for i in 1..=4 {
            let events = perform(&mut session, 12).await;
            assert_eq!(events.len(), 2);
            assert_eq!(events[0], CaptureEvent::Started);
            match &events[1] {
                CaptureEvent::Sample { sample, outcome } => {
                    assert_eq!(sample.instance_id, i);
                    assert!(matches!(outcome, AggregateOutcome::Collected { .. }));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        let events = perform(&mut session, 12).await;
        assert!(matches!(
            events.last(),
            Some(CaptureEvent::Sample {
                outcome: AggregateOutcome::Uploaded(_),
                ..
            })
        ));
        assert!(session.is_closed());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);

        assert!(perform(&mut session, 12).await.is_empty());
    }

    #[tokio::test]
    async fn test_short_recording_is_not_collected() {
        let aggregator = Arc::new(SampleAggregator::new(
            "7",
            "Home",
            5,
            Arc::new(CountingUploader::default()),
        ));
        let mut session = CaptureSession::new("home", TriggerSettings::default(), aggregator);

        let events = perform(&mut session, 11).await;
        assert_eq!(
            events.last(),
            Some(&CaptureEvent::TooShort {
                frames: 11,
                required: 12
            })
        );
        assert_eq!(session.aggregator().collected(), 0);
    }

    #[tokio::test]
    async fn test_capture_writes_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(CsvUploader::new(dir.path()).unwrap());
        let aggregator = Arc::new(SampleAggregator::new("7", "Home", 1, uploader));
        let mut session = CaptureSession::new("home", TriggerSettings::default(), aggregator);

        perform(&mut session, 12).await;
        assert!(session.is_closed());
        assert!(dir.path().join("user_7/gesture_data_custom_7.csv").exists());
        assert!(dir.path().join("user_7/raw_data/home").is_dir());
    }
}
