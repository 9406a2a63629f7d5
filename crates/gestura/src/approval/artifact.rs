//! Reading the compact dataset written by the preparation pipeline.

use std::path::Path;

use tracing::warn;

use crate::dataset::{feature_index, SampleRecord};
use crate::error::{Error, Result};

/// Records parsed from an artifact, plus the data rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArtifact {
    /// One record per well-formed row.
    pub records: Vec<SampleRecord>,
    /// 1-based line numbers of rows whose column count did not match the header.
    pub skipped: Vec<usize>,
}

/// Parse artifact text header-first.
///
/// Known columns are mapped onto [`SampleRecord`]; unknown columns are
/// ignored. Numeric cells that don't parse become `None`.
///
/// # Errors
///
/// Returns an error if there is no header plus at least one data line.
pub fn parse(
    content: &str,
    path: &Path,
    admin_id: &str,
    model_path: Option<&str>,
) -> Result<ParsedArtifact> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 {
        return Err(Error::Artifact {
            path: path.to_path_buf(),
            message: "file is empty or has no data rows".to_string(),
        });
    }

    let headers: Vec<&str> = lines[0].split(',').map(str::trim).collect();
    let mut records = Vec::with_capacity(lines.len() - 1);
    let mut skipped = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(1) {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() != headers.len() {
            warn!(
                "Skipping line {} of {}: expected {} columns, found {}",
                idx + 1,
                path.display(),
                headers.len(),
                values.len()
            );
            skipped.push(idx + 1);
            continue;
        }

        let mut record = SampleRecord::new(admin_id);
        record.model_path = model_path.map(ToString::to_string);
        for (header, value) in headers.iter().zip(&values) {
            match *header {
                "instance_id" => record.instance_id = parse_instance_id(value),
                "pose_label" => record.pose_label = Some((*value).to_string()),
                "gesture_type" => record.gesture_type = Some((*value).to_string()),
                name => {
                    if let Some(i) = feature_index(name) {
                        record.features[i] = value.parse::<f64>().ok().filter(|v| v.is_finite());
                    }
                }
            }
        }
        records.push(record);
    }

    Ok(ParsedArtifact { records, skipped })
}

/// Read and parse an artifact file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no data rows.
pub fn read(path: &Path, admin_id: &str, model_path: Option<&str>) -> Result<ParsedArtifact> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Artifact {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse(&content, path, admin_id, model_path)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_instance_id(value: &str) -> Option<i64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}
