//! Configuration management for gestura.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::landmark::Handedness;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "gestura";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "gestura.db";

/// Default pipeline working directory name, under the data directory.
const PIPELINE_DIR_NAME: &str = "pipeline";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GESTURA_`)
/// 2. TOML config file at `~/.config/gestura/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Finger-state classifier thresholds.
    pub classifier: ClassifierConfig,
    /// Recording and customization capture configuration.
    pub capture: CaptureConfig,
    /// Gesture matcher thresholds.
    pub matcher: MatcherConfig,
    /// External preparation pipeline configuration.
    pub pipeline: PipelineConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/gestura/gestura.db`
    pub database_path: Option<PathBuf>,
}

/// Thresholds for the finger-state classifier, in normalized image units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Thumb tip to palm center distance above which the thumb counts as extended.
    pub thumb_palm_distance: f64,
    /// Horizontal thumb tip to MCP displacement that counts as extended.
    pub thumb_extension_x: f64,
    /// Vertical thumb tip to MCP displacement that counts as extended.
    pub thumb_extension_y: f64,
    /// MCP–IP–tip angle (degrees) above which the thumb counts as straight.
    pub thumb_straight_angle_deg: f64,
}

/// Recording and capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// The hand whose fist starts and stops recording.
    pub trigger_hand: Handedness,
    /// Whether tracker handedness labels are mirrored relative to the operator.
    pub mirrored: bool,
    /// Minimum recorded frames for a sample to be emitted.
    pub min_frames: usize,
    /// Number of samples collected before a customization batch is uploaded.
    pub sample_quota: usize,
}

/// Gesture matcher thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum hold duration for static gestures, in milliseconds.
    pub static_hold_ms: u64,
    /// Minimum percentage of frames whose fingers must match during a static hold.
    pub min_agreement_percent: u32,
    /// Maximum wrist drift during a static hold.
    pub max_drift: f64,
    /// Minimum displacement magnitude for dynamic gestures.
    pub min_travel: f64,
    /// Minimum recorded frames for a dynamic gesture.
    pub min_motion_frames: usize,
}

/// External preparation pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working directory holding the preparation script and `user_<admin>` folders.
    /// Defaults to `~/.local/share/gestura/pipeline`
    pub code_dir: Option<PathBuf>,
    /// Interpreter used to run the script.
    pub python_bin: String,
    /// Script name, relative to the working directory.
    pub script: String,
    /// Artifact path, relative to the admin's folder.
    pub artifact: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            thumb_palm_distance: 0.08,
            thumb_extension_x: 0.04,
            thumb_extension_y: 0.03,
            thumb_straight_angle_deg: 140.0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trigger_hand: Handedness::Left,
            mirrored: true,
            min_frames: 12,
            sample_quota: 5,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            static_hold_ms: 1000,
            min_agreement_percent: 70,
            max_drift: 0.05,
            min_travel: 0.03,
            min_motion_frames: 3,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            code_dir: None, // Resolved at runtime
            python_bin: std::env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
            script: "prepare_user_data.py".to_string(),
            artifact: PathBuf::from("training_results").join("gesture_data_compact.csv"),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("GESTURA_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capture.min_frames == 0 {
            return Err(invalid("capture.min_frames must be greater than 0"));
        }
        if self.capture.sample_quota == 0 {
            return Err(invalid("capture.sample_quota must be greater than 0"));
        }

        if self.matcher.min_agreement_percent > 100 {
            return Err(invalid(format!(
                "matcher.min_agreement_percent ({}) cannot exceed 100",
                self.matcher.min_agreement_percent
            )));
        }
        for (name, value) in [
            ("matcher.max_drift", self.matcher.max_drift),
            ("matcher.min_travel", self.matcher.min_travel),
            ("classifier.thumb_palm_distance", self.classifier.thumb_palm_distance),
            ("classifier.thumb_extension_x", self.classifier.thumb_extension_x),
            ("classifier.thumb_extension_y", self.classifier.thumb_extension_y),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..=180.0).contains(&self.classifier.thumb_straight_angle_deg) {
            return Err(invalid(
                "classifier.thumb_straight_angle_deg must be between 0 and 180",
            ));
        }

        if self.pipeline.python_bin.trim().is_empty() {
            return Err(invalid("pipeline.python_bin cannot be empty"));
        }
        if self.pipeline.script.trim().is_empty() {
            return Err(invalid("pipeline.script cannot be empty"));
        }
        if self.pipeline.artifact.is_absolute() {
            return Err(invalid(
                "pipeline.artifact must be relative to the admin folder",
            ));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the pipeline working directory, resolving defaults if not set.
    #[must_use]
    pub fn pipeline_dir(&self) -> PathBuf {
        self.pipeline
            .code_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(PIPELINE_DIR_NAME))
    }

    /// Get the static hold requirement as a Duration.
    #[must_use]
    pub fn static_hold(&self) -> Duration {
        Duration::from_millis(self.matcher.static_hold_ms)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
