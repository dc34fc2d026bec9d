//! Field validation
//!
//! Checks run in a fixed order and the first failure wins, so a field
//! never reports more than one message per pass:
//!
//! ```text
//! required → (empty & optional: stop) → minLength → maxLength → pattern
//!          → min → max → email (type) → customRules (in order)
//! ```

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use formtitan_core::value::{get_path, is_blank};
use formtitan_core::{FieldDefinition, FieldType, FormDefinition, FormError, ValidationSpec};

use crate::registry::{self, RuleRegistry};

/// Generic checks, in evaluation order, each present only when its key is set
const SPEC_RULES: [&str; 5] = [
    registry::MIN_LENGTH,
    registry::MAX_LENGTH,
    registry::PATTERN,
    registry::MIN,
    registry::MAX,
];

/// Rule options per field id, kept alongside the spec they were built from
type OptionsCache = Arc<RwLock<HashMap<String, (ValidationSpec, Arc<Value>)>>>;

#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    registry: RuleRegistry,
    options: OptionsCache,
}

impl ValidationEngine {
    /// Engine with the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: RuleRegistry) -> Self {
        Self { registry, options: OptionsCache::default() }
    }

    /// Add or replace a named rule.
    ///
    /// Needs exclusive access, so registration cannot interleave with a
    /// validation pass.
    pub fn add_rule<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(Option<&Value>, &Value, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.registry.register(name, rule);
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Validate one value against its field definition
    pub fn validate_field(
        &self,
        field: &FieldDefinition,
        value: Option<&Value>,
        form_data: &Value,
    ) -> Option<String> {
        let spec = field.validation.as_ref()?;
        let options = self.options_for(field, spec);
        let options: &Value = &options;

        if spec.is_required() {
            if let Some(error) = self.run(registry::REQUIRED, value, options, form_data) {
                return Some(error);
            }
        }

        if is_blank(value) {
            return None;
        }

        for name in SPEC_RULES {
            if options.get(name).is_some() {
                if let Some(error) = self.run(name, value, options, form_data) {
                    return Some(error);
                }
            }
        }

        if field.field_type == FieldType::Email {
            if let Some(error) = self.run(registry::EMAIL, value, options, form_data) {
                return Some(error);
            }
        }

        for custom in spec.custom_rules() {
            match self.registry.get(&custom.rule_type) {
                Some(rule) => {
                    if let Some(error) = non_empty(rule(value, &custom.options, form_data)) {
                        return Some(error);
                    }
                }
                None => tracing::warn!(
                    field = %field.name,
                    rule = %custom.rule_type,
                    "custom rule is not registered; skipping"
                ),
            }
        }

        None
    }

    /// Validate every field at its `name` path; clean fields are omitted
    pub fn validate_all<'a, I>(&self, fields: I, form_data: &Value) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = &'a FieldDefinition>,
    {
        fields
            .into_iter()
            .filter_map(|field| {
                let value = get_path(form_data, &field.name);
                self.validate_field(field, value, form_data)
                    .map(|error| (field.name.clone(), error))
            })
            .collect()
    }

    /// Reject definitions whose patterns do not compile.
    ///
    /// Patterns that do compile stay cached for the `pattern` rule.
    pub fn check_patterns(&self, definition: &FormDefinition) -> Result<(), FormError> {
        for field in &definition.fields {
            if let Some(source) = field.validation.as_ref().and_then(|v| v.pattern.as_deref()) {
                self.registry.patterns().get_or_compile(source).map_err(|e| FormError::InvalidPattern {
                    field: field.id.clone(),
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    fn run(&self, name: &str, value: Option<&Value>, options: &Value, data: &Value) -> Option<String> {
        let rule = self.registry.get(name)?;
        non_empty(rule(value, options, data))
    }

    fn options_for(&self, field: &FieldDefinition, spec: &ValidationSpec) -> Arc<Value> {
        let cached = self.options.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((built_from, options)) = cached.get(&field.id) {
            if built_from == spec {
                return Arc::clone(options);
            }
        }
        drop(cached);

        let options = Arc::new(serde_json::to_value(spec).unwrap_or_default());
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.id.clone(), (spec.clone(), Arc::clone(&options)));
        options
    }
}

/// An empty message is no error
fn non_empty(error: Option<String>) -> Option<String> {
    error.filter(|message| !message.is_empty())
}
