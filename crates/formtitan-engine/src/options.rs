//! Engine options
//!
//! Readable from a YAML file; every key is optional:
//!
//! ```yaml
//! validate_on_change: true
//! validate_on_blur: true
//! reset_on_submit: false
//! show_loading_states: true
//! validation_scope: all_fields   # or visible_only
//! message_ttl_ms: 5000           # 0 keeps messages until replaced
//! ```

use serde::{Deserialize, Serialize};

use formtitan_core::FormError;

/// Which fields a full validation pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationScope {
    /// Every declared field, hidden ones included
    #[default]
    AllFields,
    /// Only fields currently visible
    VisibleOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub reset_on_submit: bool,
    pub show_loading_states: bool,
    pub validation_scope: ValidationScope,
    pub message_ttl_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            validate_on_blur: true,
            reset_on_submit: false,
            show_loading_states: true,
            validation_scope: ValidationScope::AllFields,
            message_ttl_ms: 5000,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a YAML file
    pub fn load(path: &str) -> Result<Self, FormError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FormError::Config(format!("Failed to read options file {}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FormError> {
        serde_yaml::from_str(yaml).map_err(|e| FormError::Config(format!("Invalid engine options: {}", e)))
    }

    pub fn with_validate_on_change(mut self, enabled: bool) -> Self {
        self.validate_on_change = enabled;
        self
    }

    pub fn with_validate_on_blur(mut self, enabled: bool) -> Self {
        self.validate_on_blur = enabled;
        self
    }

    pub fn with_reset_on_submit(mut self, enabled: bool) -> Self {
        self.reset_on_submit = enabled;
        self
    }

    pub fn with_loading_states(mut self, enabled: bool) -> Self {
        self.show_loading_states = enabled;
        self
    }

    pub fn with_validation_scope(mut self, scope: ValidationScope) -> Self {
        self.validation_scope = scope;
        self
    }

    pub fn with_message_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.message_ttl_ms = ttl_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = EngineOptions::from_yaml(
            r#"
reset_on_submit: true
validation_scope: visible_only
"#,
        )
        .unwrap();

        assert!(options.reset_on_submit);
        assert_eq!(options.validation_scope, ValidationScope::VisibleOnly);
        assert!(options.validate_on_change);
        assert_eq!(options.message_ttl_ms, 5000);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = EngineOptions::from_yaml("validation_scope: sometimes").unwrap_err();
        assert!(matches!(err, FormError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineOptions::load("/nonexistent/options.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read options file"));
    }
}
