//! Conditional visibility
//!
//! A field is visible when every one of its rules holds. Visibility is a
//! pure function of the current form data and is never cached.

use serde_json::Value;
use std::collections::BTreeMap;

use formtitan_core::value::{display_string, get_path, is_truthy, strict_equals, to_number};
use formtitan_core::{FieldDefinition, Operator, VisibilityRule};

#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityEngine;

impl VisibilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one rule against the form data
    pub fn evaluate_rule(&self, rule: &VisibilityRule, form_data: &Value) -> bool {
        let field_value = get_path(form_data, &rule.field);

        match &rule.operator {
            Operator::Equals => strict_equals(field_value, &rule.value),
            Operator::NotEquals => !strict_equals(field_value, &rule.value),
            Operator::Contains => is_truthy(field_value) && contains_text(field_value, &rule.value),
            Operator::NotContains => {
                !is_truthy(field_value) || !contains_text(field_value, &rule.value)
            }
            Operator::GreaterThan => to_number(field_value) > to_number(Some(&rule.value)),
            Operator::LessThan => to_number(field_value) < to_number(Some(&rule.value)),
            Operator::IsEmpty => is_empty(field_value),
            Operator::IsNotEmpty => !is_empty(field_value),
            Operator::InArray => rule
                .value
                .as_array()
                .map_or(false, |items| items.iter().any(|item| strict_equals(field_value, item))),
            Operator::Unrecognized(raw) => {
                // Fail open: a typo in a definition must not hide a field
                tracing::debug!(operator = %raw, field = %rule.field, "unrecognized visibility operator");
                true
            }
        }
    }

    /// True when the field has no rules or all of its rules hold
    pub fn is_field_visible(&self, field: &FieldDefinition, form_data: &Value) -> bool {
        field
            .visibility_rules()
            .iter()
            .all(|rule| self.evaluate_rule(rule, form_data))
    }

    /// Visibility of every field, keyed by field id
    pub fn visibility_map<'a, I>(&self, fields: I, form_data: &Value) -> BTreeMap<String, bool>
    where
        I: IntoIterator<Item = &'a FieldDefinition>,
    {
        fields
            .into_iter()
            .map(|field| (field.id.clone(), self.is_field_visible(field, form_data)))
            .collect()
    }
}

fn contains_text(field_value: Option<&Value>, needle: &Value) -> bool {
    field_value
        .map(|v| display_string(v).contains(&display_string(needle)))
        .unwrap_or(false)
}

fn is_empty(field_value: Option<&Value>) -> bool {
    !is_truthy(field_value) || field_value.map_or(true, |v| display_string(v).trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formtitan_core::FieldType;
    use serde_json::json;

    fn rule(field: &str, operator: &str, value: Value) -> VisibilityRule {
        VisibilityRule::new(field, Operator::from(operator.to_string()), value)
    }

    #[test]
    fn test_operator_table() {
        let engine = VisibilityEngine::new();
        let data = json!({
            "country": "US",
            "age": "21",
            "bio": "rust and coffee",
            "blank": "   ",
            "count": 0,
            "profile": { "plan": "pro" }
        });

        let cases = [
            (rule("country", "equals", json!("US")), true),
            (rule("country", "equals", json!("CA")), false),
            (rule("country", "not_equals", json!("CA")), true),
            (rule("bio", "contains", json!("coffee")), true),
            (rule("bio", "contains", json!("tea")), false),
            (rule("missing", "contains", json!("x")), false),
            (rule("bio", "not_contains", json!("tea")), true),
            (rule("missing", "not_contains", json!("x")), true),
            (rule("age", "greater_than", json!(18)), true),
            (rule("age", "less_than", json!("18")), false),
            (rule("missing", "greater_than", json!(0)), false),
            (rule("blank", "is_empty", json!(null)), true),
            (rule("count", "is_empty", json!(null)), true),
            (rule("missing", "is_empty", json!(null)), true),
            (rule("country", "is_not_empty", json!(null)), true),
            (rule("country", "in_array", json!(["US", "CA"])), true),
            (rule("country", "in_array", json!("US")), false),
            (rule("profile.plan", "equals", json!("pro")), true),
        ];

        for (rule, expected) in cases {
            assert_eq!(engine.evaluate_rule(&rule, &data), expected, "rule {:?}", rule);
        }
    }

    #[test]
    fn test_unknown_operator_fails_open() {
        let engine = VisibilityEngine::new();
        let field = FieldDefinition::new("state", FieldType::Text)
            .with_visibility(rule("country", "equalz", json!("US")));
        assert!(engine.is_field_visible(&field, &json!({ "country": "CA" })));
        assert!(engine.is_field_visible(&field, &json!({})));
    }

    #[test]
    fn test_rules_are_anded() {
        let engine = VisibilityEngine::new();
        let field = FieldDefinition::new("discount", FieldType::Number)
            .with_visibility(rule("member", "equals", json!(true)))
            .with_visibility(rule("age", "greater_than", json!(65)));

        assert!(engine.is_field_visible(&field, &json!({ "member": true, "age": 70 })));
        assert!(!engine.is_field_visible(&field, &json!({ "member": true, "age": 30 })));
        assert!(!engine.is_field_visible(&field, &json!({ "member": false, "age": 70 })));
    }

    #[test]
    fn test_visibility_is_pure_and_local() {
        let engine = VisibilityEngine::new();
        let state = FieldDefinition::new("state", FieldType::Select)
            .with_visibility(rule("country", "equals", json!("US")));
        let plain = FieldDefinition::new("notes", FieldType::Textarea);

        let data = json!({ "country": "US", "notes": "a" });
        assert_eq!(engine.is_field_visible(&state, &data), engine.is_field_visible(&state, &data));

        let changed = json!({ "country": "US", "notes": "something else" });
        assert!(engine.is_field_visible(&state, &changed));

        let map = engine.visibility_map([&state, &plain], &json!({ "country": "CA" }));
        assert_eq!(map.get("state"), Some(&false));
        assert_eq!(map.get("notes"), Some(&true));
    }
}
