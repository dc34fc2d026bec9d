//! In-memory form and submission store
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

use formtitan_core::{FormDefinition, FormError};
use formtitan_rules::ValidationEngine;

/// Definition served out of the box
pub const SAMPLE_FORM: &str = include_str!("../../../forms/contact-us-v1.json");

/// Most submissions returned by one listing
pub const SUBMISSION_PAGE: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Form not found")]
    NotFound(String),

    #[error("Form id '{body}' does not match '{path}'")]
    IdMismatch { path: String, body: String },

    #[error("{0}")]
    Invalid(#[from] FormError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub submission_id: String,
    pub form_id: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct FormStore {
    forms: RwLock<HashMap<String, FormDefinition>>,
    submissions: RwLock<Vec<FormSubmission>>,
}

impl FormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the sample contact form
    pub fn seeded() -> Result<Self, StoreError> {
        let store = Self::new();
        let sample = FormDefinition::from_json(SAMPLE_FORM)?;
        store.put_form(&sample.form_id.clone(), sample)?;
        Ok(store)
    }

    pub fn get_form(&self, form_id: &str) -> Result<FormDefinition, StoreError> {
        self.forms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(form_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(form_id.to_string()))
    }

    /// Insert or replace a definition after the load-time checks
    pub fn put_form(&self, form_id: &str, definition: FormDefinition) -> Result<(), StoreError> {
        if definition.form_id != form_id {
            return Err(StoreError::IdMismatch {
                path: form_id.to_string(),
                body: definition.form_id,
            });
        }
        definition.check()?;
        ValidationEngine::new().check_patterns(&definition)?;

        tracing::info!(form_id = %form_id, fields = definition.fields.len(), "form definition stored");
        self.forms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(form_id.to_string(), definition);
        Ok(())
    }

    pub fn form_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .forms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Record a submission for an existing form
    pub fn submit(&self, form_id: &str, data: Value) -> Result<FormSubmission, StoreError> {
        if !self.forms.read().unwrap_or_else(PoisonError::into_inner).contains_key(form_id) {
            return Err(StoreError::NotFound(form_id.to_string()));
        }

        let submission = FormSubmission {
            submission_id: Uuid::new_v4().to_string(),
            form_id: form_id.to_string(),
            data,
            timestamp: Utc::now(),
        };
        tracing::info!(form_id = %form_id, submission_id = %submission.submission_id, "submission received");
        self.submissions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(submission.clone());
        Ok(submission)
    }

    /// Oldest first, at most [`SUBMISSION_PAGE`]
    pub fn submissions(&self, form_id: &str) -> Vec<FormSubmission> {
        self.submissions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.form_id == form_id)
            .take(SUBMISSION_PAGE)
            .cloned()
            .collect()
    }
}
