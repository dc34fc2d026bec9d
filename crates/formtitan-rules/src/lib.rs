//! Form-Titan Rules: validation and conditional visibility
//!
//! # Architecture
//!
//! ```text
//! FieldDefinition + value + form data
//!        │                         │
//!        ▼                         ▼
//! ValidationEngine          VisibilityEngine
//!  (RuleRegistry)            (AND over rules)
//!        │                         │
//!        ▼                         ▼
//!  Option<message>            visible: bool
//! ```
//!
//! # Example
//!
//! ```
//! use formtitan_core::{FieldDefinition, FieldType, ValidationSpec};
//! use formtitan_rules::ValidationEngine;
//! use serde_json::json;
//!
//! let engine = ValidationEngine::new();
//! let field = FieldDefinition::new("email", FieldType::Email)
//!     .with_validation(ValidationSpec::new().required());
//!
//! let error = engine.validate_field(&field, Some(&json!("bob")), &json!({}));
//! assert_eq!(error.as_deref(), Some("Invalid email address"));
//! ```

pub mod registry;
pub mod validation;
pub mod visibility;

pub use registry::{PatternCache, RuleFn, RuleRegistry};
pub use validation::ValidationEngine;
pub use visibility::VisibilityEngine;

use formtitan_core::FieldDefinition;
use serde_json::Value;

/// Quick visibility check with a throwaway engine
pub fn is_visible(field: &FieldDefinition, form_data: &Value) -> bool {
    VisibilityEngine::new().is_field_visible(field, form_data)
}
