//! Storage layer for gestura.
//!
//! This module provides `SQLite`-based persistent storage for per-admin
//! gesture request entries, customization batches, and the samples persisted
//! from approved preparation runs.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::approval::{ArtifactPaths, BatchStatus, CustomizationBatch};
use crate::dataset::{SampleRecord, FEATURE_COLUMNS, FEATURE_COUNT};
use crate::error::{Error, Result};
use crate::lifecycle::{GestureRequestEntry, RequestFlag, RequestStatus};

/// Storage engine backed by a single `SQLite` connection.
///
/// Shared between components as `Arc<Mutex<Storage>>`; callers never hold the
/// lock across an await point.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

/// Storage shared between the lifecycle, upload and approval components.
pub type SharedStorage = Arc<Mutex<Storage>>;

/// Lock shared storage for the duration of one synchronous operation.
///
/// # Errors
///
/// Returns [`Error::Internal`] if a previous holder panicked.
pub fn lock(storage: &SharedStorage) -> Result<MutexGuard<'_, Storage>> {
    storage
        .lock()
        .map_err(|_| Error::internal("storage lock poisoned"))
}

const BATCH_COLUMNS: &str = "id, admin_id, gestures, sample_count, status, reject_reason, \
     artifact_paths, process_stdout, process_stderr, created_at, updated_at";

const REQUEST_COLUMNS: &str =
    "admin_id, gesture_id, gesture_name, status, customed_at, blocked_at, approved_at";

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap this storage for sharing across components.
    #[must_use]
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    /// The raw connection, for tests that inject database faults.
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    // === Gesture request entries ===

    /// All request entries for an admin, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn request_entries(&self, admin_id: &str) -> Result<Vec<GestureRequestEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM gesture_requests WHERE admin_id = ?1 ORDER BY id"
        ))?;
        let entries = stmt
            .query_map([admin_id], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Insert entries that don't exist yet. Returns how many were inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_request_entries(&self, entries: &[GestureRequestEntry]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO gesture_requests ({REQUEST_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for entry in entries {
                inserted += stmt.execute(Self::entry_params(entry))?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert or overwrite entries, keyed by admin and gesture id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn save_request_entries(&self, entries: &[GestureRequestEntry]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO gesture_requests ({REQUEST_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (admin_id, gesture_id) DO UPDATE SET
                     gesture_name = excluded.gesture_name,
                     status = excluded.status,
                     customed_at = excluded.customed_at,
                     blocked_at = excluded.blocked_at,
                     approved_at = excluded.approved_at"
            ))?;
            for entry in entries {
                stmt.execute(Self::entry_params(entry))?;
            }
        }
        tx.commit()?;
        debug!(count = entries.len(), "Saved request entries");
        Ok(entries.len())
    }

    fn entry_params(entry: &GestureRequestEntry) -> [Value; 7] {
        [
            Value::Text(entry.admin_id.clone()),
            Value::Text(entry.gesture_id.clone()),
            Value::Text(entry.gesture_name.clone()),
            Value::Text(entry.status.as_str().to_string()),
            time_value(entry.customed_at),
            time_value(entry.blocked_at),
            time_value(entry.approved_at),
        ]
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<GestureRequestEntry> {
        let status_str: String = row.get(3)?;
        let status = status_str.parse().unwrap_or_else(|_| {
            warn!("Unknown request status: {}, defaulting to ready", status_str);
            RequestStatus::Ready
        });

        Ok(GestureRequestEntry {
            admin_id: row.get(0)?,
            gesture_id: row.get(1)?,
            gesture_name: row.get(2)?,
            status,
            customed_at: parse_time(row.get(4)?),
            blocked_at: parse_time(row.get(5)?),
            approved_at: parse_time(row.get(6)?),
        })
    }

    // === Admin request flag ===

    /// Whether the admin may request customizations. Defaults to enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn request_flag(&self, admin_id: &str) -> Result<RequestFlag> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT gesture_request_status FROM admin_flags WHERE admin_id = ?1",
                [admin_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value
            .and_then(|v| v.parse().ok())
            .unwrap_or(RequestFlag::Enabled))
    }

    /// Set the admin's request flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_request_flag(&self, admin_id: &str, flag: RequestFlag) -> Result<()> {
        self.conn.execute(
            "INSERT INTO admin_flags (admin_id, gesture_request_status, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (admin_id) DO UPDATE SET
                 gesture_request_status = excluded.gesture_request_status,
                 updated_at = excluded.updated_at",
            params![admin_id, flag.as_str(), Utc::now().to_rfc3339()],
        )?;
        debug!(admin_id, flag = flag.as_str(), "Request flag updated");
        Ok(())
    }

    // === Customization batches ===

    /// Insert a batch and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_batch(&self, batch: &CustomizationBatch) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO customization_batches
                 (admin_id, gestures, sample_count, status, reject_reason, artifact_paths,
                  process_stdout, process_stderr, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                batch.admin_id,
                serde_json::to_string(&batch.gestures)?,
                i64::try_from(batch.sample_count).unwrap_or(i64::MAX),
                batch.status.as_str(),
                batch.reject_reason,
                batch
                    .artifact_paths
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                batch.process_stdout,
                batch.process_stderr,
                batch.created_at.to_rfc3339(),
                batch.updated_at.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted batch with id {}", id);
        Ok(id)
    }

    /// Overwrite a stored batch. Returns `false` if the batch has no id or
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_batch(&self, batch: &CustomizationBatch) -> Result<bool> {
        let Some(id) = batch.id else {
            return Ok(false);
        };

        let affected = self.conn.execute(
            "UPDATE customization_batches SET
                 gestures = ?2, sample_count = ?3, status = ?4, reject_reason = ?5,
                 artifact_paths = ?6, process_stdout = ?7, process_stderr = ?8, updated_at = ?9
             WHERE id = ?1",
            params![
                id,
                serde_json::to_string(&batch.gestures)?,
                i64::try_from(batch.sample_count).unwrap_or(i64::MAX),
                batch.status.as_str(),
                batch.reject_reason,
                batch
                    .artifact_paths
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                batch.process_stdout,
                batch.process_stderr,
                batch.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Get a batch by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_batch(&self, id: i64) -> Result<Option<CustomizationBatch>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM customization_batches WHERE id = ?1"),
                [id],
                Self::row_to_batch,
            )
            .optional()?;
        Ok(result)
    }

    /// The admin's most recent batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_batch_for_admin(&self, admin_id: &str) -> Result<Option<CustomizationBatch>> {
        let result = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BATCH_COLUMNS} FROM customization_batches WHERE admin_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                [admin_id],
                Self::row_to_batch,
            )
            .optional()?;
        Ok(result)
    }

    /// List batches, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_batches(&self, status: Option<BatchStatus>) -> Result<Vec<CustomizationBatch>> {
        let batches = if let Some(status) = status {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {BATCH_COLUMNS} FROM customization_batches WHERE status = ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([status.as_str()], Self::row_to_batch)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {BATCH_COLUMNS} FROM customization_batches
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], Self::row_to_batch)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(batches)
    }

    fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<CustomizationBatch> {
        let gestures_json: String = row.get(2)?;
        let gestures = serde_json::from_str(&gestures_json).unwrap_or_else(|e| {
            warn!("Invalid gesture list in batch: {}", e);
            Vec::new()
        });

        let sample_count: i64 = row.get(3)?;
        let status_str: String = row.get(4)?;
        let status = status_str.parse().unwrap_or_else(|_| {
            warn!("Unknown batch status: {}, defaulting to failed", status_str);
            BatchStatus::Failed
        });

        let artifact_paths: Option<String> = row.get(6)?;
        let artifact_paths = artifact_paths.and_then(|json| {
            serde_json::from_str::<ArtifactPaths>(&json)
                .map_err(|e| warn!("Invalid artifact paths in batch: {}", e))
                .ok()
        });

        Ok(CustomizationBatch {
            id: Some(row.get(0)?),
            admin_id: row.get(1)?,
            gestures,
            sample_count: usize::try_from(sample_count).unwrap_or(0),
            status,
            reject_reason: row.get(5)?,
            artifact_paths,
            process_stdout: row.get(7)?,
            process_stderr: row.get(8)?,
            created_at: parse_time(row.get(9)?).unwrap_or_else(Utc::now),
            updated_at: parse_time(row.get(10)?).unwrap_or_else(Utc::now),
        })
    }

    // === Persisted samples ===

    /// Replace all of an admin's samples in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; the previous samples
    /// are left untouched in that case.
    pub fn replace_samples(&self, admin_id: &str, records: &[SampleRecord]) -> Result<usize> {
        let columns = FEATURE_COLUMNS.join(", ");
        let placeholders = (1..=FEATURE_COUNT + 6)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO admin_samples
                 (admin_id, instance_id, pose_label, gesture_type, {columns}, model_path, created_at)
             VALUES ({placeholders})"
        );

        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM admin_samples WHERE admin_id = ?1", [admin_id])?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let mut values = Vec::with_capacity(FEATURE_COUNT + 6);
                values.push(Value::Text(admin_id.to_string()));
                values.push(record.instance_id.map_or(Value::Null, Value::Integer));
                values.push(record.pose_label.clone().map_or(Value::Null, Value::Text));
                values.push(record.gesture_type.clone().map_or(Value::Null, Value::Text));
                values.extend(
                    record
                        .features
                        .iter()
                        .map(|f| f.map_or(Value::Null, Value::Real)),
                );
                values.push(record.model_path.clone().map_or(Value::Null, Value::Text));
                values.push(Value::Text(record.created_at.to_rfc3339()));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        info!(
            admin_id,
            removed,
            inserted = records.len(),
            "Replaced admin samples"
        );
        Ok(records.len())
    }

    /// An admin's samples ordered by pose label, then instance id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn samples(&self, admin_id: &str) -> Result<Vec<SampleRecord>> {
        let columns = FEATURE_COLUMNS.join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, admin_id, instance_id, pose_label, gesture_type, {columns}, model_path, created_at
             FROM admin_samples WHERE admin_id = ?1
             ORDER BY pose_label, instance_id"
        ))?;
        let samples = stmt
            .query_map([admin_id], Self::row_to_sample)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    /// Number of samples stored for an admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_samples(&self, admin_id: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM admin_samples WHERE admin_id = ?1",
            [admin_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_sample(row: &rusqlite::Row) -> rusqlite::Result<SampleRecord> {
        let mut features = [None; FEATURE_COUNT];
        for (i, slot) in features.iter_mut().enumerate() {
            *slot = row.get(5 + i)?;
        }

        Ok(SampleRecord {
            id: Some(row.get(0)?),
            admin_id: row.get(1)?,
            instance_id: row.get(2)?,
            pose_label: row.get(3)?,
            gesture_type: row.get(4)?,
            features,
            model_path: row.get(5 + FEATURE_COUNT)?,
            created_at: parse_time(row.get(6 + FEATURE_COUNT)?).unwrap_or_else(Utc::now),
        })
    }
}

fn time_value(time: Option<DateTime<Utc>>) -> Value {
    time.map_or(Value::Null, |t| Value::Text(t.to_rfc3339()))
}

fn parse_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::feature_index;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn entry(admin: &str, gesture: &str, status: RequestStatus) -> GestureRequestEntry {
        GestureRequestEntry {
            admin_id: admin.to_string(),
            gesture_id: gesture.to_string(),
            gesture_name: crate::template::display_name(gesture),
            status,
            customed_at: None,
            blocked_at: None,
            approved_at: None,
        }
    }

    fn batch(admin: &str, status: BatchStatus) -> CustomizationBatch {
        let mut batch = CustomizationBatch::new(admin, vec!["zoom_in".to_string()], 5);
        batch.status = status;
        batch
    }

    fn record(admin: &str, label: &str, instance: i64) -> SampleRecord {
        let mut record = SampleRecord::new(admin);
        record.instance_id = Some(instance);
        record.pose_label = Some(label.to_string());
        record.features[feature_index("delta_x").unwrap()] = Some(0.12);
        record
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
        assert_eq!(storage.unwrap().path(), Path::new(":memory:"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gestura.db");

        let storage = Storage::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(storage.path(), path);
    }

    #[test]
    fn test_open_file_based_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gestura.db");

        {
            let storage = Storage::open(&path).unwrap();
            storage
                .insert_request_entries(&[entry("1", "home", RequestStatus::Ready)])
                .unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.request_entries("1").unwrap().len(), 1);
    }

    #[test]
    fn test_insert_request_entries_ignores_existing() {
        let storage = create_test_storage();
        let inserted = storage
            .insert_request_entries(&[
                entry("1", "home", RequestStatus::Ready),
                entry("1", "end", RequestStatus::Ready),
            ])
            .unwrap();
        assert_eq!(inserted, 2);

        let inserted = storage
            .insert_request_entries(&[entry("1", "home", RequestStatus::Customed)])
            .unwrap();
        assert_eq!(inserted, 0);

        let entries = storage.request_entries("1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].gesture_id, "home");
        assert_eq!(entries[0].status, RequestStatus::Ready);
        assert_eq!(entries[0].gesture_name, "Home");
    }

    #[test]
    fn test_save_request_entries_round_trips_timestamps() {
        let storage = create_test_storage();
        let mut e = entry("1", "zoom_in", RequestStatus::Blocked);
        e.blocked_at = Some(Utc::now());
        storage.save_request_entries(&[e.clone()]).unwrap();

        let loaded = &storage.request_entries("1").unwrap()[0];
        assert_eq!(loaded.status, RequestStatus::Blocked);
        assert!(loaded.blocked_at.is_some());
        assert!(loaded.customed_at.is_none());

        e.status = RequestStatus::Ready;
        e.blocked_at = None;
        storage.save_request_entries(&[e]).unwrap();
        let loaded = &storage.request_entries("1").unwrap()[0];
        assert_eq!(loaded.status, RequestStatus::Ready);
        assert!(loaded.blocked_at.is_none());
    }

    #[test]
    fn test_request_entries_isolated_per_admin() {
        let storage = create_test_storage();
        storage
            .insert_request_entries(&[
                entry("1", "home", RequestStatus::Ready),
                entry("2", "home", RequestStatus::Ready),
            ])
            .unwrap();
        assert_eq!(storage.request_entries("1").unwrap().len(), 1);
        assert!(storage.request_entries("3").unwrap().is_empty());
    }

    #[test]
    fn test_request_flag_defaults_enabled() {
        let storage = create_test_storage();
        assert_eq!(storage.request_flag("1").unwrap(), RequestFlag::Enabled);

        storage.set_request_flag("1", RequestFlag::Disabled).unwrap();
        assert_eq!(storage.request_flag("1").unwrap(), RequestFlag::Disabled);

        storage.set_request_flag("1", RequestFlag::Enabled).unwrap();
        assert_eq!(storage.request_flag("1").unwrap(), RequestFlag::Enabled);
    }

    #[test]
    fn test_insert_and_get_batch() {
        let storage = create_test_storage();
        let id = storage.insert_batch(&batch("1", BatchStatus::Pending)).unwrap();

        let loaded = storage.get_batch(id).unwrap().unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.admin_id, "1");
        assert_eq!(loaded.gestures, vec!["zoom_in".to_string()]);
        assert_eq!(loaded.sample_count, 5);
        assert_eq!(loaded.status, BatchStatus::Pending);
        assert!(loaded.artifact_paths.is_none());
    }

    #[test]
    fn test_get_nonexistent_batch() {
        let storage = create_test_storage();
        assert!(storage.get_batch(99999).unwrap().is_none());
    }

    #[test]
    fn test_update_batch() {
        let storage = create_test_storage();
        let id = storage.insert_batch(&batch("1", BatchStatus::Pending)).unwrap();

        let mut loaded = storage.get_batch(id).unwrap().unwrap();
        loaded.status = BatchStatus::Failed;
        loaded.reject_reason = Some("script exited with code 1".to_string());
        loaded.process_stderr = Some("Traceback".to_string());
        loaded.artifact_paths = Some(ArtifactPaths::for_admin(Path::new("/pipeline"), "1"));
        assert!(storage.update_batch(&loaded).unwrap());

        let reloaded = storage.get_batch(id).unwrap().unwrap();
        assert_eq!(reloaded.status, BatchStatus::Failed);
        assert_eq!(reloaded.process_stderr.as_deref(), Some("Traceback"));
        assert_eq!(
            reloaded.artifact_paths.unwrap().raw_data_dir,
            PathBuf::from("/pipeline/user_1/raw_data")
        );
    }

    #[test]
    fn test_update_batch_without_id() {
        let storage = create_test_storage();
        assert!(!storage.update_batch(&batch("1", BatchStatus::Pending)).unwrap());
    }

    #[test]
    fn test_list_batches_newest_first_and_filtered() {
        let storage = create_test_storage();
        let first = storage.insert_batch(&batch("1", BatchStatus::Approved)).unwrap();
        let second = storage.insert_batch(&batch("2", BatchStatus::Pending)).unwrap();
        let third = storage.insert_batch(&batch("3", BatchStatus::Pending)).unwrap();

        let all: Vec<i64> = storage
            .list_batches(None)
            .unwrap()
            .into_iter()
            .filter_map(|b| b.id)
            .collect();
        assert_eq!(all, vec![third, second, first]);

        let pending = storage.list_batches(Some(BatchStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|b| b.status == BatchStatus::Pending));
    }

    #[test]
    fn test_latest_batch_for_admin() {
        let storage = create_test_storage();
        assert!(storage.latest_batch_for_admin("1").unwrap().is_none());

        storage.insert_batch(&batch("1", BatchStatus::Rejected)).unwrap();
        let newer = storage.insert_batch(&batch("1", BatchStatus::Pending)).unwrap();
        storage.insert_batch(&batch("2", BatchStatus::Pending)).unwrap();

        let latest = storage.latest_batch_for_admin("1").unwrap().unwrap();
        assert_eq!(latest.id, Some(newer));
    }

    #[test]
    fn test_replace_samples() {
        let storage = create_test_storage();
        storage
            .replace_samples("1", &[record("1", "zoom_in", 1), record("1", "home", 2)])
            .unwrap();
        storage
            .replace_samples("2", &[record("2", "end", 1)])
            .unwrap();
        assert_eq!(storage.count_samples("1").unwrap(), 2);

        let replaced = storage
            .replace_samples(
                "1",
                &[
                    record("1", "zoom_in", 2),
                    record("1", "zoom_in", 1),
                    record("1", "end", 3),
                ],
            )
            .unwrap();
        assert_eq!(replaced, 3);

        let samples = storage.samples("1").unwrap();
        let order: Vec<(Option<String>, Option<i64>)> = samples
            .iter()
            .map(|s| (s.pose_label.clone(), s.instance_id))
            .collect();
        assert_eq!(
            order,
            vec![
                (Some("end".to_string()), Some(3)),
                (Some("zoom_in".to_string()), Some(1)),
                (Some("zoom_in".to_string()), Some(2)),
            ]
        );
        assert_eq!(samples[0].feature("delta_x"), Some(0.12));
        assert_eq!(samples[0].feature("delta_y"), None);

        // Other admins are untouched
        assert_eq!(storage.count_samples("2").unwrap(), 1);
    }

    #[test]
    fn test_replace_samples_with_empty_clears() {
        let storage = create_test_storage();
        storage.replace_samples("1", &[record("1", "home", 1)]).unwrap();
        storage.replace_samples("1", &[]).unwrap();
        assert_eq!(storage.count_samples("1").unwrap(), 0);
    }
}
