//! The tabular sample format shared with the preparation pipeline.
//!
//! Uploads write [`MotionSample`]s as CSV rows with [`CSV_COLUMNS`]; the
//! pipeline's compact artifact is read back into [`SampleRecord`]s, which is
//! what gets persisted per admin.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::recorder::MotionSample;

/// Numeric feature columns, in file order.
pub const FEATURE_COLUMNS: [&str; 20] = [
    "left_finger_state_0",
    "left_finger_state_1",
    "left_finger_state_2",
    "left_finger_state_3",
    "left_finger_state_4",
    "right_finger_state_0",
    "right_finger_state_1",
    "right_finger_state_2",
    "right_finger_state_3",
    "right_finger_state_4",
    "motion_x_start",
    "motion_y_start",
    "motion_x_mid",
    "motion_y_mid",
    "motion_x_end",
    "motion_y_end",
    "main_axis_x",
    "main_axis_y",
    "delta_x",
    "delta_y",
];

/// Number of numeric feature columns.
pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

/// Full CSV header written for uploads.
pub const CSV_COLUMNS: [&str; 22] = [
    "instance_id",
    "pose_label",
    "left_finger_state_0",
    "left_finger_state_1",
    "left_finger_state_2",
    "left_finger_state_3",
    "left_finger_state_4",
    "right_finger_state_0",
    "right_finger_state_1",
    "right_finger_state_2",
    "right_finger_state_3",
    "right_finger_state_4",
    "motion_x_start",
    "motion_y_start",
    "motion_x_mid",
    "motion_y_mid",
    "motion_x_end",
    "motion_y_end",
    "main_axis_x",
    "main_axis_y",
    "delta_x",
    "delta_y",
];

/// The CSV header line.
#[must_use]
pub fn csv_header() -> String {
    CSV_COLUMNS.join(",")
}

/// Render a sample as CSV cells. An empty `pose_label` falls back to `gesture_name`.
#[must_use]
pub fn sample_row(sample: &MotionSample, gesture_name: &str) -> Vec<String> {
    let label = if sample.pose_label.trim().is_empty() {
        gesture_name
    } else {
        sample.pose_label.as_str()
    };

    let mut row = Vec::with_capacity(CSV_COLUMNS.len());
    row.push(sample.instance_id.to_string());
    row.push(label.to_string());
    row.extend(sample.left_finger_state.bits().iter().map(ToString::to_string));
    row.extend(sample.right_finger_state.bits().iter().map(ToString::to_string));
    for value in [
        sample.motion_x_start,
        sample.motion_y_start,
        sample.motion_x_mid,
        sample.motion_y_mid,
        sample.motion_x_end,
        sample.motion_y_end,
    ] {
        row.push(value.to_string());
    }
    row.push(u8::from(sample.main_axis_x).to_string());
    row.push(u8::from(sample.main_axis_y).to_string());
    row.push(sample.delta_x.to_string());
    row.push(sample.delta_y.to_string());
    row
}

/// A persisted sample for one admin, as produced by the preparation pipeline.
///
/// Numeric columns that were absent or non-numeric in the artifact are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Row id assigned by storage.
    pub id: Option<i64>,
    /// Owning admin.
    pub admin_id: String,
    /// Instance number within the dataset.
    pub instance_id: Option<i64>,
    /// Gesture label.
    pub pose_label: Option<String>,
    /// Optional gesture category emitted by the pipeline.
    pub gesture_type: Option<String>,
    /// Values for [`FEATURE_COLUMNS`], in order.
    pub features: [Option<f64>; FEATURE_COUNT],
    /// Directory holding the admin's trained models.
    pub model_path: Option<String>,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

impl SampleRecord {
    /// An empty record for `admin_id`.
    #[must_use]
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            id: None,
            admin_id: admin_id.into(),
            instance_id: None,
            pose_label: None,
            gesture_type: None,
            features: [None; FEATURE_COUNT],
            model_path: None,
            created_at: Utc::now(),
        }
    }

    /// Value of a named feature column.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|idx| self.features[idx])
    }
}

/// Position of a feature column, if `name` is one.
#[must_use]
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|c| *c == name)
}

impl Serialize for SampleRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = self.id {
            map.serialize_entry("id", &id)?;
        }
        map.serialize_entry("admin_id", &self.admin_id)?;
        map.serialize_entry("instance_id", &self.instance_id)?;
        map.serialize_entry("pose_label", &self.pose_label)?;
        if let Some(gesture_type) = &self.gesture_type {
            map.serialize_entry("gesture_type", gesture_type)?;
        }
        for (name, value) in FEATURE_COLUMNS.iter().zip(&self.features) {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("model_path", &self.model_path)?;
        map.serialize_entry("created_at", &self.created_at.to_rfc3339())?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FingerState;

    fn sample() -> MotionSample {
        MotionSample {
            pose_label: "zoom_in".to_string(),
            instance_id: 4,
            left_finger_state: FingerState::CLOSED,
            right_finger_state: FingerState::from_bits([1, 1, 1, 0, 0]),
            motion_x_start: 0.5,
            motion_y_start: 0.7,
            motion_x_mid: 0.5,
            motion_y_mid: 0.6,
            motion_x_end: 0.5,
            motion_y_end: 0.5,
            main_axis_x: false,
            main_axis_y: true,
            delta_x: 0.0,
            delta_y: -0.2,
        }
    }

    #[test]
    fn test_columns_agree() {
        assert_eq!(&CSV_COLUMNS[2..], &FEATURE_COLUMNS[..]);
        assert!(csv_header().starts_with("instance_id,pose_label,left_finger_state_0"));
    }

    #[test]
    fn test_sample_row() {
        let row = sample_row(&sample(), "Zoom_in");
        assert_eq!(row.len(), CSV_COLUMNS.len());
        assert_eq!(row[0], "4");
        assert_eq!(row[1], "zoom_in");
        assert_eq!(&row[2..7], &["0", "0", "0", "0", "0"]);
        assert_eq!(&row[7..12], &["1", "1", "1", "0", "0"]);
        assert_eq!(row[18], "0");
        assert_eq!(row[19], "1");
        assert_eq!(row[21], "-0.2");
    }

    #[test]
    fn test_sample_row_label_fallback() {
        let mut s = sample();
        s.pose_label = String::new();
        assert_eq!(sample_row(&s, "Zoom_in")[1], "Zoom_in");
    }

    #[test]
    fn test_record_feature_lookup() {
        let mut record = SampleRecord::new("7");
        record.features[feature_index("delta_y").unwrap()] = Some(-0.2);

        assert_eq!(record.feature("delta_y"), Some(-0.2));
        assert_eq!(record.feature("delta_x"), None);
        assert_eq!(record.feature("bogus"), None);
    }

    #[test]
    fn test_record_serializes_flat() {
        let mut record = SampleRecord::new("7");
        record.pose_label = Some("home".to_string());
        record.features[0] = Some(1.0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["admin_id"], "7");
        assert_eq!(json["pose_label"], "home");
        assert_eq!(json["left_finger_state_0"], 1.0);
        assert!(json["delta_x"].is_null());
        assert!(json.get("gesture_type").is_none());
    }
}
