//! Error types for gestura.
//!
//! This module defines all error types used throughout the gestura crate,
//! providing detailed context for debugging and the HTTP-style status code
//! each failure maps to when surfaced through [`crate::api`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for gestura operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Request Errors ===
    /// The caller supplied missing or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller's role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource is in a state that does not allow the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    // === Capture Errors ===
    /// Uploading a batch of customization samples failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// No template exists for the requested gesture.
    #[error("unknown gesture template '{0}'")]
    UnknownTemplate(String),

    // === Pipeline Errors ===
    /// The external preparation executable failed.
    #[error("preparation pipeline failed: {0}")]
    Pipeline(#[from] PipelineFailure),

    /// The preparation artifact could not be parsed.
    #[error("invalid artifact {path}: {message}")]
    Artifact {
        /// Path of the artifact file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for gestura operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a new not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The HTTP-style status code this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::UnknownTemplate(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            _ => 500,
        }
    }

    /// Captured process output, if this error came from the external pipeline.
    #[must_use]
    pub fn pipeline_output(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Pipeline(failure) => Some(failure),
            _ => None,
        }
    }
}

/// How the external preparation executable failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineFailureKind {
    /// The process could not be started at all.
    Spawn,
    /// The process ran and exited with a non-zero code (`None` if killed by a signal).
    Exit(Option<i32>),
}

impl fmt::Display for PipelineFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn => write!(f, "failed to start"),
            Self::Exit(Some(code)) => write!(f, "exited with code {code}"),
            Self::Exit(None) => write!(f, "terminated by signal"),
        }
    }
}

/// A failed run of the external preparation executable, with its captured output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("script {script} {kind}{}", format_detail(.detail.as_deref()))]
pub struct PipelineFailure {
    /// Script (or program) that was invoked.
    pub script: String,
    /// Classification of the failure.
    pub kind: PipelineFailureKind,
    /// Extra detail, such as the OS error for a spawn failure.
    pub detail: Option<String>,
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
}

fn format_detail(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}
