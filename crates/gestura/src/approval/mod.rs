//! Customization approval pipeline.
//!
//! An admin submits their recorded samples as a [`CustomizationBatch`]. A
//! superadmin either rejects it or approves it; approval runs the external
//! preparation executable, reads the compact dataset it produces and replaces
//! the admin's persisted samples with it.
//!
//! Batch states: `pending` → `processing` → `approved` | `failed`, and
//! `pending` | `failed` → `rejected`. A failed batch may be approved again.
//! A batch left in `processing` by a run that died (no approval slot held
//! for its admin in this process) is treated like a failed one.

pub mod artifact;
pub mod runner;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dataset::SampleRecord;
use crate::error::{Error, Result};
use crate::lifecycle::{Actor, Lifecycle, RequestFlag};
use crate::storage::{self, SharedStorage};
use crate::upload::{master_csv_path, user_dir};

pub use runner::{PreparationJob, PreparationRunner, ProcessOutput, ProcessRunner};

/// Reason recorded when a superadmin rejects without giving one.
pub const DEFAULT_REJECT_REASON: &str = "Rejected by superadmin";

/// Status of a customization batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Waiting for a superadmin.
    Pending,
    /// The preparation executable is running.
    Processing,
    /// Samples were persisted.
    Approved,
    /// A superadmin declined the batch.
    Rejected,
    /// Preparation or parsing failed; may be approved again.
    Failed,
}

impl BatchStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Whether a superadmin may approve or reject a batch in this state.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            other => Err(Error::invalid_input(format!("unknown batch status '{other}'"))),
        }
    }
}

/// Where the preparation pipeline keeps an admin's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Trained models.
    pub models_dir: PathBuf,
    /// Compact dataset and reports.
    pub training_results_dir: PathBuf,
    /// Uploaded raw CSVs.
    pub raw_data_dir: PathBuf,
}

impl ArtifactPaths {
    /// Paths below `user_<admin>` in the pipeline directory.
    #[must_use]
    pub fn for_admin(pipeline_dir: &Path, admin_id: &str) -> Self {
        let user_dir = user_dir(pipeline_dir, admin_id);
        Self {
            models_dir: user_dir.join("models"),
            training_results_dir: user_dir.join("training_results"),
            raw_data_dir: user_dir.join("raw_data"),
        }
    }
}

/// An admin's batch of samples awaiting, or past, a superadmin decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationBatch {
    /// Storage id; `None` until inserted.
    pub id: Option<i64>,
    /// Owning admin.
    pub admin_id: String,
    /// Gestures covered by the batch.
    pub gestures: Vec<String>,
    /// Data rows in the admin's master CSV at submission.
    pub sample_count: usize,
    /// Current status.
    pub status: BatchStatus,
    /// Why the batch was rejected or failed.
    pub reject_reason: Option<String>,
    /// Output locations, set on approval.
    pub artifact_paths: Option<ArtifactPaths>,
    /// Captured stdout of the last preparation run.
    pub process_stdout: Option<String>,
    /// Captured stderr of the last preparation run.
    pub process_stderr: Option<String>,
    /// When the batch was first submitted.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl CustomizationBatch {
    /// A new pending batch.
    #[must_use]
    pub fn new(admin_id: impl Into<String>, gestures: Vec<String>, sample_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            admin_id: admin_id.into(),
            gestures,
            sample_count,
            status: BatchStatus::Pending,
            reject_reason: None,
            artifact_paths: None,
            process_stdout: None,
            process_stderr: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn set_status(&mut self, status: BatchStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Releases an admin's approval slot when dropped.
struct ApprovalSlot<'a> {
    running: &'a Mutex<HashSet<String>>,
    admin_id: String,
}

impl<'a> ApprovalSlot<'a> {
    fn is_held(running: &Mutex<HashSet<String>>, admin_id: &str) -> bool {
        running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(admin_id)
    }

    fn acquire(running: &'a Mutex<HashSet<String>>, admin_id: &str) -> Option<Self> {
        let mut set = running.lock().unwrap_or_else(PoisonError::into_inner);
        if set.insert(admin_id.to_string()) {
            Some(Self {
                running,
                admin_id: admin_id.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for ApprovalSlot<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.admin_id);
    }
}

/// Submit, approve and reject customization batches.
#[derive(Debug)]
pub struct ApprovalPipeline {
    storage: SharedStorage,
    lifecycle: Lifecycle,
    runner: Arc<dyn PreparationRunner>,
    pipeline_dir: PathBuf,
    config: PipelineConfig,
    running: Mutex<HashSet<String>>,
}

impl ApprovalPipeline {
    /// Create a pipeline working in `pipeline_dir`.
    #[must_use]
    pub fn new(
        storage: SharedStorage,
        lifecycle: Lifecycle,
        runner: Arc<dyn PreparationRunner>,
        pipeline_dir: PathBuf,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            lifecycle,
            runner,
            pipeline_dir,
            config,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Submit the caller's recorded samples for approval.
    ///
    /// Without an explicit gesture list the batch covers every label found in
    /// the master CSV. An open batch (pending, failed, or processing with no
    /// run behind it) is reused.
    ///
    /// # Errors
    ///
    /// Returns 400 if the admin has no master CSV and 409 while the admin's
    /// approval is running.
    pub fn submit(
        &self,
        actor: &Actor,
        gestures: Option<Vec<String>>,
    ) -> Result<CustomizationBatch> {
        let admin_id = actor.admin_id.as_str();
        let master = master_csv_path(&self.pipeline_dir, admin_id);
        let content = std::fs::read_to_string(&master).map_err(|e| {
            debug!("Cannot read {}: {}", master.display(), e);
            Error::invalid_input(format!("no recorded samples were found for admin {admin_id}"))
        })?;

        let (labels, sample_count) = summarize_master(&content);
        let gestures = gestures.filter(|g| !g.is_empty()).unwrap_or(labels);

        let batch = {
            let storage = storage::lock(&self.storage)?;
            let batch = match storage.latest_batch_for_admin(admin_id)? {
                Some(existing)
                    if existing.status == BatchStatus::Processing
                        && ApprovalSlot::is_held(&self.running, admin_id) =>
                {
                    return Err(Error::conflict(format!(
                        "batch {} is being processed",
                        existing.id.unwrap_or_default()
                    )));
                }
                Some(mut existing) if self.is_open(&existing) => {
                    existing.gestures = gestures;
                    existing.sample_count = sample_count;
                    existing.reject_reason = None;
                    existing.set_status(BatchStatus::Pending);
                    storage.update_batch(&existing)?;
                    existing
                }
                _ => {
                    let mut batch = CustomizationBatch::new(admin_id, gestures, sample_count);
                    batch.id = Some(storage.insert_batch(&batch)?);
                    batch
                }
            };
            storage.set_request_flag(admin_id, RequestFlag::Disabled)?;
            batch
        };
        self.lifecycle.block_all(admin_id)?;

        info!(
            admin_id,
            batch = batch.id.unwrap_or_default(),
            samples = batch.sample_count,
            "Customization submitted for approval"
        );
        Ok(batch)
    }

    /// Batches, newest first. Ordinary admins only see their own.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn list(
        &self,
        actor: &Actor,
        status: Option<BatchStatus>,
    ) -> Result<Vec<CustomizationBatch>> {
        let batches = storage::lock(&self.storage)?.list_batches(status)?;
        if actor.is_superadmin() {
            Ok(batches)
        } else {
            Ok(batches
                .into_iter()
                .filter(|b| b.admin_id == actor.admin_id)
                .collect())
        }
    }

    /// The admin's most recent batch.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn status(&self, admin_id: &str) -> Result<Option<CustomizationBatch>> {
        storage::lock(&self.storage)?.latest_batch_for_admin(admin_id)
    }

    /// Pending, failed, or processing with its admin's slot free.
    fn is_open(&self, batch: &CustomizationBatch) -> bool {
        match batch.status {
            BatchStatus::Processing => !ApprovalSlot::is_held(&self.running, &batch.admin_id),
            status => status.is_actionable(),
        }
    }

    /// Load a batch and take its admin's approval slot.
    fn actionable_batch(&self, id: i64) -> Result<(CustomizationBatch, ApprovalSlot<'_>)> {
        let batch = storage::lock(&self.storage)?
            .get_batch(id)?
            .ok_or_else(|| Error::not_found(format!("batch {id}")))?;

        let Some(slot) = ApprovalSlot::acquire(&self.running, &batch.admin_id) else {
            return Err(Error::conflict(format!(
                "an approval for admin {} is already running",
                batch.admin_id
            )));
        };
        // Holding the slot means no run is behind a `processing` batch
        if !(batch.status.is_actionable() || batch.status == BatchStatus::Processing) {
            return Err(Error::invalid_input(format!(
                "cannot act on batch {id} in status {}",
                batch.status
            )));
        }
        if batch.status == BatchStatus::Processing {
            warn!(batch = id, admin_id = %batch.admin_id, "Recovering abandoned batch");
        }
        Ok((batch, slot))
    }

    /// Approve a batch: run preparation and persist the resulting samples.
    ///
    /// Once the batch is marked `processing`, any failure marks it `failed`
    /// with the error text and captured process output, and the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns 403 for non-superadmins, 404 for an unknown id, 409 if the
    /// admin's approval is already running, 400 unless the batch is open, and
    /// the preparation or storage error otherwise.
    pub async fn approve(&self, actor: &Actor, id: i64) -> Result<CustomizationBatch> {
        actor.require_superadmin("approve customization batches")?;
        let (mut batch, _slot) = self.actionable_batch(id)?;

        batch.set_status(BatchStatus::Processing);
        storage::lock(&self.storage)?.update_batch(&batch)?;
        info!(batch = id, admin_id = %batch.admin_id, "Approving customization batch");

        let paths = ArtifactPaths::for_admin(&self.pipeline_dir, &batch.admin_id);
        let stored = match self.prepare(&mut batch, &paths).await {
            Ok(stored) => stored,
            Err(e) => return self.fail(batch, e),
        };
        purge_raw_data(&paths.raw_data_dir);

        info!(
            batch = id,
            admin_id = %batch.admin_id,
            samples = stored,
            "Customization batch approved"
        );
        Ok(batch)
    }

    /// Run preparation and persist its artifact, leaving `batch` approved.
    async fn prepare(
        &self,
        batch: &mut CustomizationBatch,
        paths: &ArtifactPaths,
    ) -> Result<usize> {
        let job =
            PreparationJob::for_admin(&self.config, self.pipeline_dir.clone(), &batch.admin_id);
        let output = self.runner.run(&job).await.map_err(Error::Pipeline)?;
        batch.process_stdout = Some(output.stdout);
        batch.process_stderr = Some(output.stderr);

        let stored = self.persist_artifact(&batch.admin_id, paths)?;

        batch.artifact_paths = Some(paths.clone());
        batch.reject_reason = None;
        batch.set_status(BatchStatus::Approved);
        let storage = storage::lock(&self.storage)?;
        storage.update_batch(batch)?;
        storage.set_request_flag(&batch.admin_id, RequestFlag::Enabled)?;
        Ok(stored)
    }

    fn persist_artifact(&self, admin_id: &str, paths: &ArtifactPaths) -> Result<usize> {
        let path = user_dir(&self.pipeline_dir, admin_id).join(&self.config.artifact);
        let model_path = paths.models_dir.to_string_lossy();
        let parsed = artifact::read(&path, admin_id, Some(&model_path))?;
        if !parsed.skipped.is_empty() {
            warn!(
                skipped = parsed.skipped.len(),
                "Some artifact rows were skipped for admin {}", admin_id
            );
        }
        if parsed.records.is_empty() {
            return Err(Error::Artifact {
                path,
                message: "no rows could be parsed".to_string(),
            });
        }
        storage::lock(&self.storage)?.replace_samples(admin_id, &parsed.records)
    }

    /// Record `error` on the batch and return it. If the failure itself
    /// cannot be stored the batch stays `processing` until it is recovered.
    fn fail(&self, mut batch: CustomizationBatch, error: Error) -> Result<CustomizationBatch> {
        warn!(
            batch = batch.id.unwrap_or_default(),
            "Customization batch failed: {}", error
        );
        batch.reject_reason = Some(error.to_string());
        batch.artifact_paths = None;
        if let Some(failure) = error.pipeline_output() {
            batch.process_stdout = Some(failure.stdout.clone());
            batch.process_stderr = Some(failure.stderr.clone());
        }
        batch.set_status(BatchStatus::Failed);
        if let Err(e) = storage::lock(&self.storage).and_then(|s| s.update_batch(&batch)) {
            warn!(
                batch = batch.id.unwrap_or_default(),
                "Could not record batch failure: {}", e
            );
        }
        Err(error)
    }

    /// Reject a batch and give the admin their gestures back.
    ///
    /// # Errors
    ///
    /// Returns 403 for non-superadmins, 404 for an unknown id, 409 while the
    /// admin's approval is running and 400 unless the batch is open.
    pub fn reject(
        &self,
        actor: &Actor,
        id: i64,
        reason: Option<&str>,
    ) -> Result<CustomizationBatch> {
        actor.require_superadmin("reject customization batches")?;
        let (mut batch, _slot) = self.actionable_batch(id)?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECT_REASON);
        batch.reject_reason = Some(reason.to_string());
        batch.set_status(BatchStatus::Rejected);
        {
            let storage = storage::lock(&self.storage)?;
            storage.update_batch(&batch)?;
            storage.set_request_flag(&batch.admin_id, RequestFlag::Enabled)?;
        }
        self.lifecycle.unblock_all(&batch.admin_id)?;

        info!(batch = id, admin_id = %batch.admin_id, reason, "Customization batch rejected");
        Ok(batch)
    }

    /// An admin's persisted samples, ordered by label then instance id.
    ///
    /// # Errors
    ///
    /// Returns 400 on a blank admin id.
    pub fn samples(&self, admin_id: &str) -> Result<Vec<SampleRecord>> {
        if admin_id.trim().is_empty() {
            return Err(Error::invalid_input("admin id is required"));
        }
        storage::lock(&self.storage)?.samples(admin_id)
    }
}

/// Distinct pose labels in file order, and the number of data rows.
fn summarize_master(content: &str) -> (Vec<String>, usize) {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return (Vec::new(), 0);
    };
    let label_idx = header.split(',').map(str::trim).position(|h| h == "pose_label");

    let mut labels: Vec<String> = Vec::new();
    let mut count = 0;
    for line in lines {
        count += 1;
        if let Some(label) = label_idx.and_then(|i| line.split(',').nth(i)) {
            let label = label.trim();
            if !label.is_empty() && !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
    }
    (labels, count)
}

fn purge_raw_data(raw_data_dir: &Path) {
    match std::fs::remove_dir_all(raw_data_dir) {
        Ok(()) => debug!("Purged {}", raw_data_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to purge {}: {}", raw_data_dir.display(), e),
    }
}
