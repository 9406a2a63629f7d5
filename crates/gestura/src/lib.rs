//! `gestura` - Hand-gesture practice, capture and customization approval
//!
//! This library turns per-frame hand landmarks into finger states and motion
//! samples, matches them against gesture templates, and manages the
//! per-admin workflow that takes custom gesture samples from capture through
//! superadmin approval into storage.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregator;
pub mod api;
pub mod approval;
pub mod capture;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod landmark;
pub mod lifecycle;
pub mod logging;
pub mod matcher;
pub mod recorder;
pub mod storage;
pub mod template;
pub mod trigger;
pub mod upload;

pub use api::ApiResponse;
pub use approval::{ApprovalPipeline, BatchStatus, CustomizationBatch};
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{Actor, Lifecycle, Role};
pub use logging::init_logging;
pub use matcher::{Matcher, PracticeSession};
pub use storage::{SharedStorage, Storage};
pub use template::TemplateLibrary;
