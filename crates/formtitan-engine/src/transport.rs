//! Transport boundary: where definitions come from and submissions go
//!
//! The engine only suspends inside these two calls. Retries, auth and
//! cancellation belong to the implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

use formtitan_core::{FormDefinition, FormError};

/// Fallback text when a failed submission carries no server message
pub const SUBMISSION_FAILED: &str = "Submission failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl SubmitResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Non-success status; `detail` is the server's text when it sent one
    #[error("{detail}")]
    Status { code: u16, detail: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Status error with the server detail, or a generic text when empty
    pub fn status(code: u16, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}: {}", code, SUBMISSION_FAILED));
        Self::Status { code, detail }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportError> for FormError {
    fn from(err: TransportError) -> Self {
        FormError::Network(err.to_string())
    }
}

/// Source of form definitions and sink for submissions.
///
/// Implementations may use `async fn` directly.
pub trait Transport: Send + Sync {
    fn fetch_definition(
        &self,
        form_id: &str,
    ) -> impl Future<Output = Result<FormDefinition, TransportError>> + Send;

    fn submit(
        &self,
        form_id: &str,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<SubmitResponse, TransportError>> + Send;
}
