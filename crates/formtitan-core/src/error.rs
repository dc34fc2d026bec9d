//! Unified Error Model
use thiserror::Error;

/// Failures that abort an operation on a form.
///
/// Validation failures are not represented here: they are ordinary data
/// returned by the validation engine and stored in the form state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("DEFINITION/{0}")]
    Definition(String),

    #[error("NETWORK/{0}")]
    Network(String),

    #[error("LAYOUT/nesting deeper than {max} levels at node '{node_id}'")]
    MalformedLayout { node_id: String, max: usize },

    #[error("PATTERN/field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("CONFIG/{0}")]
    Config(String),
}

impl FormError {
    /// Message suitable for showing to the person filling the form
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(msg) | Self::Definition(msg) | Self::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for FormError {
    fn from(err: serde_json::Error) -> Self {
        Self::Definition(err.to_string())
    }
}
