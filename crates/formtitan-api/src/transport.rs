//! In-process transport backed by the form store
use std::sync::Arc;

use formtitan_core::FormDefinition;
use formtitan_engine::{SubmissionPayload, SubmitResponse, Transport, TransportError};

use crate::handlers::SUBMISSION_RECEIVED;
use crate::store::{FormStore, StoreError};

/// Lets a [`formtitan_engine::FormEngine`] run against the server's store
/// without going over HTTP.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    store: Arc<FormStore>,
}

impl LocalTransport {
    pub fn new(store: Arc<FormStore>) -> Self {
        Self { store }
    }
}

fn status_error(err: StoreError) -> TransportError {
    let code = match err {
        StoreError::NotFound(_) => 404,
        StoreError::IdMismatch { .. } => 400,
        StoreError::Invalid(_) => 422,
    };
    TransportError::status(code, Some(err.to_string()))
}

impl Transport for LocalTransport {
    async fn fetch_definition(&self, form_id: &str) -> Result<FormDefinition, TransportError> {
        self.store.get_form(form_id).map_err(status_error)
    }

    async fn submit(
        &self,
        form_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmitResponse, TransportError> {
        let submission = self
            .store
            .submit(form_id, payload.data.clone())
            .map_err(status_error)?;
        Ok(SubmitResponse {
            message: SUBMISSION_RECEIVED.to_string(),
            submission_id: Some(submission.submission_id),
            status: Some("success".to_string()),
        })
    }
}
