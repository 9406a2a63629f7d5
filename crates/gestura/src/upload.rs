//! Persisting uploaded customization samples as CSV.
//!
//! Each upload writes one raw file under
//! `user_<admin>/raw_data/<slug>/` and appends the same rows, renumbered, to
//! the admin's master file `user_<admin>/gesture_data_custom_<admin>.csv`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::Uploader;
use crate::dataset::{csv_header, sample_row};
use crate::error::{Error, Result};
use crate::recorder::MotionSample;

/// Body of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Admin the samples belong to.
    pub admin_id: String,
    /// Gesture the samples were recorded for.
    pub gesture_name: String,
    /// Collected samples.
    pub samples: Vec<MotionSample>,
}

/// Where an upload was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// The per-upload raw CSV.
    pub raw_file: PathBuf,
    /// The admin's master CSV.
    pub master_file: PathBuf,
    /// Rows written.
    pub rows: usize,
}

/// Path of an admin's working folder inside the pipeline directory.
#[must_use]
pub fn user_dir(pipeline_dir: &Path, admin_id: &str) -> PathBuf {
    pipeline_dir.join(format!("user_{admin_id}"))
}

/// Path of an admin's master CSV.
#[must_use]
pub fn master_csv_path(pipeline_dir: &Path, admin_id: &str) -> PathBuf {
    user_dir(pipeline_dir, admin_id).join(format!("gesture_data_custom_{admin_id}.csv"))
}

/// Writes uploads below a pipeline directory.
#[derive(Debug, Clone)]
pub struct CsvUploader {
    pipeline_dir: PathBuf,
    slug_regex: Regex,
}

impl CsvUploader {
    /// Create an uploader rooted at `pipeline_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug pattern fails to compile.
    pub fn new(pipeline_dir: impl Into<PathBuf>) -> Result<Self> {
        let slug_regex = Regex::new(r"[^a-z0-9_-]")
            .map_err(|e| Error::internal(format!("invalid slug pattern: {e}")))?;
        Ok(Self {
            pipeline_dir: pipeline_dir.into(),
            slug_regex,
        })
    }

    /// The pipeline directory.
    #[must_use]
    pub fn pipeline_dir(&self) -> &Path {
        &self.pipeline_dir
    }

    /// Directory-safe form of a gesture name: lowercase, anything outside
    /// `[a-z0-9_-]` replaced with `_`, `unknown` when blank.
    #[must_use]
    pub fn slug(&self, gesture_name: &str) -> String {
        let lowered = gesture_name.trim().to_lowercase();
        if lowered.is_empty() {
            return "unknown".to_string();
        }
        self.slug_regex.replace_all(&lowered, "_").into_owned()
    }

    /// Write the raw file and append to the master file.
    ///
    /// # Errors
    ///
    /// Returns 400 on a blank admin id, blank gesture name or empty sample
    /// list, and an I/O error if either file cannot be written.
    pub fn write(&self, request: &UploadRequest) -> Result<UploadReceipt> {
        let admin_id = request.admin_id.trim();
        let gesture_name = request.gesture_name.trim();
        if admin_id.is_empty() || gesture_name.is_empty() {
            return Err(Error::invalid_input("admin id and gesture name are required"));
        }
        if request.samples.is_empty() {
            return Err(Error::invalid_input("no samples to upload"));
        }

        let slug = self.slug(gesture_name);
        let user_dir = user_dir(&self.pipeline_dir, admin_id);
        let gesture_dir = user_dir.join("raw_data").join(&slug);
        fs::create_dir_all(&gesture_dir).map_err(|source| Error::DirectoryCreate {
            path: gesture_dir.clone(),
            source,
        })?;

        let rows: Vec<Vec<String>> = request
            .samples
            .iter()
            .map(|s| sample_row(s, gesture_name))
            .collect();

        let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let raw_file = gesture_dir.join(format!(
            "gesture_data_custom_{admin_id}_{slug}_{timestamp}.csv"
        ));
        let mut lines = vec![csv_header()];
        lines.extend(rows.iter().map(|r| r.join(",")));
        fs::write(&raw_file, lines.join("\n"))?;
        debug!("Wrote raw upload {}", raw_file.display());

        let master_file = master_csv_path(&self.pipeline_dir, admin_id);
        append_to_master(&master_file, rows.clone())?;

        info!(
            admin_id,
            gesture = gesture_name,
            rows = rows.len(),
            "Stored uploaded samples"
        );
        Ok(UploadReceipt {
            raw_file,
            master_file,
            rows: rows.len(),
        })
    }
}

#[async_trait::async_trait]
impl Uploader for CsvUploader {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt> {
        let uploader = self.clone();
        tokio::task::spawn_blocking(move || uploader.write(&request))
            .await
            .map_err(|e| Error::internal(format!("upload task failed: {e}")))?
    }
}

/// Append rows, renumbering `instance_id` from the file's last row + 1.
fn append_to_master(path: &Path, mut rows: Vec<Vec<String>>) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let next_id = existing.as_deref().map_or(1, next_instance_id);
    for (offset, row) in (0u64..).zip(rows.iter_mut()) {
        if let Some(cell) = row.first_mut() {
            *cell = (next_id + offset).to_string();
        }
    }
    let payload = rows
        .iter()
        .map(|r| r.join(","))
        .collect::<Vec<_>>()
        .join("\n");

    if existing.is_some() {
        let mut file = fs::OpenOptions::new().append(true).open(path)?;
        write!(file, "\n{payload}")?;
    } else {
        fs::write(path, format!("{}\n{payload}", csv_header()))?;
    }
    Ok(())
}

/// One past the `instance_id` of the last data row, or 1 without data rows.
fn next_instance_id(content: &str) -> u64 {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 {
        return 1;
    }
    lines
        .last()
        .and_then(|line| line.split(',').next())
        .and_then(|cell| cell.trim().parse::<f64>().ok())
        .filter(|id| id.is_finite() && *id >= 0.0)
        .map_or(1, |id| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let id = id as u64;
            id + 1
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FingerState;

    fn sample(instance_id: u64, dy: f64) -> MotionSample {
        MotionSample {
            pose_label: "zoom_in".to_string(),
            instance_id,
            left_finger_state: FingerState::CLOSED,
            right_finger_state: FingerState::from_bits([1, 1, 1, 0, 0]),
            motion_x_start: 0.5,
            motion_y_start: 0.7,
            motion_x_mid: 0.5,
            motion_y_mid: 0.7 + dy / 2.0,
            motion_x_end: 0.5,
            motion_y_end: 0.7 + dy,
            main_axis_x: false,
            main_axis_y: true,
            delta_x: 0.0,
            delta_y: dy,
        }
    }

    fn request(admin: &str, name: &str, count: u64) -> UploadRequest {
        UploadRequest {
            admin_id: admin.to_string(),
            gesture_name: name.to_string(),
            samples: (1..=count).map(|i| sample(i, -0.2)).collect(),
        }
    }

    #[test]
    fn test_slug() {
        let uploader = CsvUploader::new("/tmp").unwrap();
        assert_eq!(uploader.slug("Zoom_in"), "zoom_in");
        assert_eq!(uploader.slug(" Next Slide! "), "next_slide_");
        assert_eq!(uploader.slug("rotate-up"), "rotate-up");
        assert_eq!(uploader.slug("   "), "unknown");
    }

    #[test]
    fn test_write_creates_raw_and_master() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = CsvUploader::new(dir.path()).unwrap();

        let receipt = uploader.write(&request("7", "Zoom_in", 5)).unwrap();
        assert_eq!(receipt.rows, 5);
        assert!(receipt.raw_file.starts_with(dir.path().join("user_7/raw_data/zoom_in")));
        assert!(receipt
            .raw_file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("gesture_data_custom_7_zoom_in_"));
        assert_eq!(receipt.master_file, master_csv_path(dir.path(), "7"));

        let raw = fs::read_to_string(&receipt.raw_file).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], csv_header());
        assert!(lines[1].starts_with("1,zoom_in,0,0,0,0,0,1,1,1,0,0,"));

        let master = fs::read_to_string(&receipt.master_file).unwrap();
        assert_eq!(master.lines().count(), 6);
    }

    #[test]
    fn test_master_renumbers_instance_ids() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = CsvUploader::new(dir.path()).unwrap();

        uploader.write(&request("7", "Zoom_in", 5)).unwrap();
        let receipt = uploader.write(&request("7", "Home", 3)).unwrap();

        let master = fs::read_to_string(&receipt.master_file).unwrap();
        let ids: Vec<&str> = master
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
        assert_eq!(master.lines().filter(|l| *l == csv_header()).count(), 1);
    }

    #[test]
    fn test_label_falls_back_to_gesture_name() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = CsvUploader::new(dir.path()).unwrap();
        let mut req = request("7", "Home", 1);
        req.samples[0].pose_label = String::new();

        let receipt = uploader.write(&req).unwrap();
        let raw = fs::read_to_string(&receipt.raw_file).unwrap();
        assert!(raw.lines().nth(1).unwrap().starts_with("1,Home,"));
    }

    #[test]
    fn test_write_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = CsvUploader::new(dir.path()).unwrap();

        let err = uploader.write(&request("", "Home", 1)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = uploader.write(&request("7", " ", 1)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = uploader.write(&request("7", "Home", 0)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_next_instance_id() {
        assert_eq!(next_instance_id(""), 1);
        assert_eq!(next_instance_id("instance_id,pose_label\n"), 1);
        assert_eq!(next_instance_id("instance_id,pose_label\n1,a\n9,b\n"), 10);
        assert_eq!(next_instance_id("instance_id,pose_label\nx,a"), 1);
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(request("7", "Home", 1)).unwrap();
        assert_eq!(json["adminId"], "7");
        assert_eq!(json["gestureName"], "Home");
        assert_eq!(json["samples"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uploader_trait_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = CsvUploader::new(dir.path()).unwrap();

        let receipt = uploader.upload(request("7", "End", 2)).await.unwrap();
        assert!(receipt.raw_file.exists());
        assert!(receipt.master_file.exists());
    }
}
