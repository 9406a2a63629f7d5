//! The `{ success, message, data }` response envelope.
//!
//! Lifecycle and approval operations return `Result<T>`; this module turns
//! those into the envelope plus the HTTP-style status code the error maps to.

use serde::Serialize;

use crate::error::{Error, Result};

/// Captured output of a failed preparation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDetail {
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process output when the external pipeline failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessDetail>,
    /// Status code; not part of the body.
    #[serde(skip)]
    pub status: u16,
}

impl<T: Serialize> ApiResponse<T> {
    /// A 200 response carrying `data`.
    #[must_use]
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            process: None,
            status: 200,
        }
    }

    /// A failure response for `error`, with its mapped status code.
    #[must_use]
    pub fn failure(message: impl Into<String>, error: &Error) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.to_string()),
            process: error.pipeline_output().map(|f| ProcessDetail {
                stdout: f.stdout.clone(),
                stderr: f.stderr.clone(),
            }),
            status: error.status_code(),
        }
    }

    /// Wrap an operation result. `failed` is used as the message on error.
    #[must_use]
    pub fn from_result(result: Result<T>, succeeded: &str, failed: &str) -> Self {
        match result {
            Ok(data) => Self::ok(succeeded, data),
            Err(e) => Self::failure(failed, &e),
        }
    }

    /// The envelope as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineFailure, PipelineFailureKind};

    #[test]
    fn test_ok_envelope() {
        let response = ApiResponse::ok("Gesture request created/updated", 3);
        assert_eq!(response.status, 200);

        let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 3);
        assert!(json.get("error").is_none());
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_failure_status_codes() {
        let cases = [
            (Error::invalid_input("gesture id is required"), 400),
            (Error::forbidden("only superadmin can approve requests"), 403),
            (Error::not_found("batch 9"), 404),
            (Error::conflict("already blocked"), 409),
            (Error::internal("boom"), 500),
        ];
        for (error, code) in cases {
            let response: ApiResponse<()> = ApiResponse::failure("Failed", &error);
            assert!(!response.success);
            assert_eq!(response.status, code);
            assert!(response.process.is_none());
        }
    }

    #[test]
    fn test_failure_carries_process_output() {
        let error = Error::Pipeline(PipelineFailure {
            script: "prepare_user_data.py".to_string(),
            kind: PipelineFailureKind::Exit(Some(2)),
            detail: None,
            stdout: "loading".to_string(),
            stderr: "Traceback".to_string(),
        });
        let response: ApiResponse<()> =
            ApiResponse::failure("Failed to process customization request", &error);

        assert_eq!(response.status, 500);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["process"]["stderr"], "Traceback");
        assert!(json["error"].as_str().unwrap().contains("exited with code 2"));
    }

    #[test]
    fn test_from_result() {
        let ok = ApiResponse::from_result(Ok(vec![1, 2]), "Listed", "Failed to list");
        assert!(ok.success);
        assert_eq!(ok.message, "Listed");

        let err: ApiResponse<Vec<i32>> =
            ApiResponse::from_result(Err(Error::not_found("x")), "Listed", "Failed to list");
        assert!(!err.success);
        assert_eq!(err.message, "Failed to list");
        assert_eq!(err.status, 404);
    }
}
