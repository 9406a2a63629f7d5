//! Invoking the external preparation executable.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineFailure, PipelineFailureKind};

/// One invocation of the preparation executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationJob {
    /// Interpreter or program to start.
    pub program: String,
    /// Script passed as the first argument.
    pub script: String,
    /// Remaining arguments.
    pub args: Vec<String>,
    /// Working directory of the process.
    pub working_dir: PathBuf,
}

impl PreparationJob {
    /// The job that prepares one admin's data: `<python> <script> --user-id <admin>`.
    #[must_use]
    pub fn for_admin(config: &PipelineConfig, working_dir: PathBuf, admin_id: &str) -> Self {
        Self {
            program: config.python_bin.clone(),
            script: config.script.clone(),
            args: vec!["--user-id".to_string(), admin_id.to_string()],
            working_dir,
        }
    }

    fn failure(
        &self,
        kind: PipelineFailureKind,
        detail: Option<String>,
        output: ProcessOutput,
    ) -> PipelineFailure {
        PipelineFailure {
            script: self.script.clone(),
            kind,
            detail,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

/// Runs preparation jobs.
#[async_trait::async_trait]
pub trait PreparationRunner: Send + Sync + std::fmt::Debug {
    /// Run the job to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] if the process cannot start or exits non-zero.
    async fn run(&self, job: &PreparationJob) -> Result<ProcessOutput, PipelineFailure>;
}

/// Runs jobs as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl PreparationRunner for ProcessRunner {
    async fn run(&self, job: &PreparationJob) -> Result<ProcessOutput, PipelineFailure> {
        info!(
            program = %job.program,
            script = %job.script,
            args = ?job.args,
            dir = %job.working_dir.display(),
            "Starting preparation"
        );

        let output = Command::new(&job.program)
            .arg(&job.script)
            .args(&job.args)
            .current_dir(&job.working_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                warn!("Failed to start {}: {}", job.program, e);
                job.failure(
                    PipelineFailureKind::Spawn,
                    Some(e.to_string()),
                    ProcessOutput::default(),
                )
            })?;

        let captured = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            debug!(stdout_bytes = captured.stdout.len(), "Preparation finished");
            Ok(captured)
        } else {
            warn!("Preparation {} exited with {}", job.script, output.status);
            Err(job.failure(PipelineFailureKind::Exit(output.status.code()), None, captured))
        }
    }
}
