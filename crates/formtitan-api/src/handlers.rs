//! API Handlers
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use formtitan_core::{FormDefinition, FormState, FORMTITAN_VERSION};
use formtitan_engine::{SubmissionPayload, SubmitResponse};
use formtitan_layout::{render_outline, FieldKindRegistry, LayoutContext, LayoutInterpreter};
use formtitan_rules::VisibilityEngine;

use crate::store::{FormStore, FormSubmission, StoreError};

pub type AppState = Arc<FormStore>;

pub const SUBMISSION_RECEIVED: &str = "Your submission has been received successfully!";

/// Store failure rendered as `{"detail": ...}`
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::IdMismatch { .. } => StatusCode::BAD_REQUEST,
            StoreError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if status != StatusCode::NOT_FOUND {
            tracing::warn!(error = %self.0, "request rejected");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Form-Titan API is running!" }))
}

pub async fn get_form(
    State(store): State<AppState>,
    Path(form_id): Path<String>,
) -> Result<Json<FormDefinition>, ApiError> {
    Ok(Json(store.get_form(&form_id)?))
}

pub async fn put_form(
    State(store): State<AppState>,
    Path(form_id): Path<String>,
    Json(definition): Json<FormDefinition>,
) -> Result<Json<Value>, ApiError> {
    store.put_form(&form_id, definition)?;
    Ok(Json(json!({
        "status": "success",
        "message": "Form definition updated successfully"
    })))
}

pub async fn submit_form(
    State(store): State<AppState>,
    Path(form_id): Path<String>,
    Json(payload): Json<SubmissionPayload>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission = store.submit(&form_id, payload.data)?;
    Ok(Json(SubmitResponse {
        message: SUBMISSION_RECEIVED.to_string(),
        submission_id: Some(submission.submission_id),
        status: Some("success".to_string()),
    }))
}

pub async fn list_submissions(
    State(store): State<AppState>,
    Path(form_id): Path<String>,
) -> Json<Vec<FormSubmission>> {
    Json(store.submissions(&form_id))
}

/// Plain-text outline of the form as it would render for the posted data
pub async fn preview_form(
    State(store): State<AppState>,
    Path(form_id): Path<String>,
    Json(payload): Json<SubmissionPayload>,
) -> Result<Response, ApiError> {
    let definition = store.get_form(&form_id)?;
    let data = match payload.data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let state = FormState::with_data(data);

    let visibility = VisibilityEngine::new().visibility_map(&definition.fields, state.data());
    let kinds = FieldKindRegistry::with_builtins();
    let ctx = LayoutContext::new(&definition, &visibility, &kinds);
    let tree = LayoutInterpreter::new()
        .resolve(&definition.layout_definition, &ctx)
        .map_err(StoreError::from)?;
    let outline = tree.map(|t| render_outline(&t, &state)).unwrap_or_default();

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], outline).into_response())
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "version": FORMTITAN_VERSION })))
}
