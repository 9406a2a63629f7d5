//! `SQLite` schema definitions for gestura.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// Per-admin, per-gesture customization request entries.
pub const CREATE_GESTURE_REQUESTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS gesture_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    admin_id TEXT NOT NULL,
    gesture_id TEXT NOT NULL,
    gesture_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ready',
    customed_at TEXT,
    blocked_at TEXT,
    approved_at TEXT,
    UNIQUE (admin_id, gesture_id)
)
";

/// Index for loading an admin's entries.
pub const CREATE_REQUESTS_ADMIN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_gesture_requests_admin ON gesture_requests(admin_id)
";

/// Whether an admin may currently request customizations.
pub const CREATE_ADMIN_FLAGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS admin_flags (
    admin_id TEXT PRIMARY KEY,
    gesture_request_status TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Customization batches submitted for approval.
pub const CREATE_BATCHES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS customization_batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    admin_id TEXT NOT NULL,
    gestures TEXT NOT NULL,
    sample_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    reject_reason TEXT,
    artifact_paths TEXT,
    process_stdout TEXT,
    process_stderr TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Index for status filtering.
pub const CREATE_BATCHES_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_batches_status ON customization_batches(status)
";

/// Index for per-admin lookups.
pub const CREATE_BATCHES_ADMIN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_batches_admin ON customization_batches(admin_id)
";

/// Samples persisted from approved pipeline artifacts.
pub const CREATE_ADMIN_SAMPLES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS admin_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    admin_id TEXT NOT NULL,
    instance_id INTEGER,
    pose_label TEXT,
    gesture_type TEXT,
    left_finger_state_0 REAL,
    left_finger_state_1 REAL,
    left_finger_state_2 REAL,
    left_finger_state_3 REAL,
    left_finger_state_4 REAL,
    right_finger_state_0 REAL,
    right_finger_state_1 REAL,
    right_finger_state_2 REAL,
    right_finger_state_3 REAL,
    right_finger_state_4 REAL,
    motion_x_start REAL,
    motion_y_start REAL,
    motion_x_mid REAL,
    motion_y_mid REAL,
    motion_x_end REAL,
    motion_y_end REAL,
    main_axis_x REAL,
    main_axis_y REAL,
    delta_x REAL,
    delta_y REAL,
    model_path TEXT,
    created_at TEXT NOT NULL
)
";

/// Index for ordered per-admin sample listing.
pub const CREATE_SAMPLES_ADMIN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_admin_samples_admin
    ON admin_samples(admin_id, pose_label, instance_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_GESTURE_REQUESTS_TABLE,
    CREATE_REQUESTS_ADMIN_INDEX,
    CREATE_ADMIN_FLAGS_TABLE,
    CREATE_BATCHES_TABLE,
    CREATE_BATCHES_STATUS_INDEX,
    CREATE_BATCHES_ADMIN_INDEX,
    CREATE_ADMIN_SAMPLES_TABLE,
    CREATE_SAMPLES_ADMIN_INDEX,
    CREATE_METADATA_TABLE,
];
