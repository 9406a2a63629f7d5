//! Collects customization samples up to a quota and uploads them once.
//!
//! The aggregator sits behind the trigger session: every completed
//! [`MotionSample`] is handed to [`SampleAggregator::add`]. When the quota is
//! reached the whole batch goes through an [`Uploader`]; on success the
//! session is closed and the lifecycle is told the gesture is customed. A
//! failed upload keeps the samples so the next sample, or
//! [`SampleAggregator::retry_upload`], tries again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::recorder::MotionSample;
use crate::upload::{UploadReceipt, UploadRequest};

/// Destination for a full batch of samples.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync + std::fmt::Debug {
    /// Persist the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be stored.
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt>;
}

/// Receives notice that an admin finished customizing a gesture.
#[async_trait::async_trait]
pub trait LifecycleSink: Send + Sync + std::fmt::Debug {
    /// Mark the gesture as customed for the admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the lifecycle rejects the transition.
    async fn mark_customed(&self, admin_id: &str, gesture_name: &str) -> Result<()>;
}

/// What happened to a sample handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AggregateOutcome {
    /// Stored; quota not reached yet.
    Collected {
        /// Samples held.
        count: usize,
        /// Samples needed.
        quota: usize,
    },
    /// The batch was uploaded and the session is closed.
    Uploaded(UploadReceipt),
    /// The upload failed; samples are kept for a retry.
    UploadFailed {
        /// Error text from the uploader.
        message: String,
    },
    /// Another upload is running.
    UploadInFlight,
    /// The session already uploaded its batch.
    Closed,
}

/// Per-session sample collector.
#[derive(Debug)]
pub struct SampleAggregator {
    admin_id: String,
    gesture_name: String,
    quota: usize,
    uploader: Arc<dyn Uploader>,
    sink: Option<Arc<dyn LifecycleSink>>,
    samples: Mutex<Vec<MotionSample>>,
    in_flight: AtomicBool,
    complete: AtomicBool,
}

impl SampleAggregator {
    /// Create an aggregator. A quota of zero is treated as one.
    #[must_use]
    pub fn new(
        admin_id: impl Into<String>,
        gesture_name: impl Into<String>,
        quota: usize,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self {
            admin_id: admin_id.into(),
            gesture_name: gesture_name.into(),
            quota: quota.max(1),
            uploader,
            sink: None,
            samples: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            complete: AtomicBool::new(false),
        }
    }

    /// Notify `sink` after a successful upload.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LifecycleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Samples currently held.
    #[must_use]
    pub fn collected(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Samples needed before uploading.
    #[must_use]
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Whether the batch has been uploaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Add a sample, uploading once the quota is reached.
    pub async fn add(&self, sample: MotionSample) -> AggregateOutcome {
        if self.is_complete() {
            debug!("Session closed, ignoring sample");
            return AggregateOutcome::Closed;
        }

        let count = {
            let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
            samples.push(sample);
            samples.len()
        };

        if count < self.quota {
            return AggregateOutcome::Collected {
                count,
                quota: self.quota,
            };
        }
        self.try_upload().await
    }

    /// Retry a failed upload without waiting for another sample.
    pub async fn retry_upload(&self) -> AggregateOutcome {
        self.try_upload().await
    }

    async fn try_upload(&self) -> AggregateOutcome {
        if self.is_complete() {
            return AggregateOutcome::Closed;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Upload already in flight");
            return AggregateOutcome::UploadInFlight;
        }

        let samples = self
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if samples.len() < self.quota {
            self.in_flight.store(false, Ordering::SeqCst);
            return AggregateOutcome::Collected {
                count: samples.len(),
                quota: self.quota,
            };
        }

        let request = UploadRequest {
            admin_id: self.admin_id.clone(),
            gesture_name: self.gesture_name.clone(),
            samples,
        };

        let result = self.uploader.upload(request).await;
        match result {
            Ok(receipt) => {
                self.complete.store(true, Ordering::SeqCst);
                self.in_flight.store(false, Ordering::SeqCst);
                info!(
                    admin_id = %self.admin_id,
                    gesture = %self.gesture_name,
                    rows = receipt.rows,
                    "Customization samples uploaded"
                );

                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.mark_customed(&self.admin_id, &self.gesture_name).await {
                        warn!("Failed to update gesture request after upload: {}", e);
                    }
                }
                AggregateOutcome::Uploaded(receipt)
            }
            Err(e) => {
                self.in_flight.store(false, Ordering::SeqCst);
                warn!("Upload failed: {}", e);
                AggregateOutcome::UploadFailed {
                    message: e.to_string(),
                }
            }
        }
    }
}
