//! Data Model: FormDefinition, FieldDefinition, LayoutNode
//!
//! Mirrors the JSON shape served for a form (camelCase keys). Optional
//! collections accept both an absent key and an explicit `null`.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::FormError;
use crate::MAX_LAYOUT_DEPTH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    /// Form identifier (ex: "contact-us-v1")
    pub form_id: String,
    /// Display name, used by the `title` layout slot
    pub name: String,
    /// Used by the `subtitle` layout slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: FormConfig,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    pub layout_definition: LayoutNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    /// input | edit
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "input".to_string()
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { mode: default_mode() }
    }
}

impl FormDefinition {
    /// Parse a definition from JSON text
    pub fn from_json(content: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a definition from a JSON file
    pub fn load(path: &str) -> Result<Self, FormError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FormError::Definition(format!("Failed to read form file {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    /// Look up a field by its layout id
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Look up a field by its data key
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Structural checks run when a definition is loaded.
    ///
    /// Rejects duplicate field ids and layout trees nested deeper than
    /// [`MAX_LAYOUT_DEPTH`]. Layout references to unknown field ids are not
    /// an error; see [`FormDefinition::unresolved_field_ids`].
    pub fn check(&self) -> Result<(), FormError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(FormError::Definition(format!(
                    "duplicate field id '{}' in form '{}'",
                    field.id, self.form_id
                )));
            }
        }

        let depth = self.layout_definition.depth();
        if depth > MAX_LAYOUT_DEPTH {
            return Err(FormError::MalformedLayout {
                node_id: self.layout_definition.id().to_string(),
                max: MAX_LAYOUT_DEPTH,
            });
        }
        Ok(())
    }

    /// Field ids referenced by the layout that no field declares
    pub fn unresolved_field_ids(&self) -> Vec<String> {
        let mut missing = Vec::new();
        self.layout_definition.visit(&mut |node| {
            if let LayoutNode::Field { field_id, .. } = node {
                if self.field(field_id).is_none() {
                    missing.push(field_id.clone());
                }
            }
        });
        missing
    }
}

// ============================================================================
// Fields
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Addresses layout slots
    pub id: String,
    /// Addresses form data (dotted paths allowed)
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<VisibilityRule>>,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            field_type,
            label: String::new(),
            placeholder: None,
            instructions: None,
            default_value: None,
            options: None,
            validation: None,
            visibility: None,
        }
    }

    /// Use a data key different from the id
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Add a visibility condition (all conditions must hold)
    pub fn with_visibility(mut self, rule: VisibilityRule) -> Self {
        self.visibility.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn with_option(mut self, value: impl Into<Value>, label: impl Into<String>) -> Self {
        self.options.get_or_insert_with(Vec::new).push(FieldOption {
            value: value.into(),
            label: label.into(),
        });
        self
    }

    pub fn is_required(&self) -> bool {
        self.validation.as_ref().map(|v| v.is_required()).unwrap_or(false)
    }

    pub fn visibility_rules(&self) -> &[VisibilityRule] {
        self.visibility.as_deref().unwrap_or(&[])
    }

    pub fn options(&self) -> &[FieldOption] {
        self.options.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
}

/// Known field kinds, plus the raw name of any kind this engine does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    Email,
    Tel,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
    Number,
    Url,
    Password,
    Unregistered(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Date => "date",
            Self::Number => "number",
            Self::Url => "url",
            Self::Password => "password",
            Self::Unregistered(name) => name,
        }
    }

    /// All kinds known at compile time
    pub fn builtin() -> [FieldType; 11] {
        [
            Self::Text,
            Self::Email,
            Self::Tel,
            Self::Textarea,
            Self::Select,
            Self::Checkbox,
            Self::Radio,
            Self::Date,
            Self::Number,
            Self::Url,
            Self::Password,
        ]
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        Self::builtin()
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .unwrap_or(Self::Unregistered(name))
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<FieldType> for String {
    fn from(kind: FieldType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Validation & Visibility
// ============================================================================

/// Declarative constraints for one field. Absent keys are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<Vec<CustomRule>>,
}

impl ValidationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn min(mut self, n: f64) -> Self {
        self.min = Some(n);
        self
    }

    pub fn max(mut self, n: f64) -> Self {
        self.max = Some(n);
        self
    }

    pub fn custom(mut self, rule_type: impl Into<String>, options: Value) -> Self {
        self.custom_rules.get_or_insert_with(Vec::new).push(CustomRule {
            rule_type: rule_type.into(),
            options,
        });
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn custom_rules(&self) -> &[CustomRule] {
        self.custom_rules.as_deref().unwrap_or(&[])
    }
}

/// Reference to a named rule in the validator registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub options: Value,
}

/// A condition on another field's current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    /// Data key (dotted path) of the field being tested
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl VisibilityRule {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self { field: field.into(), operator, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    InArray,
    /// Kept verbatim so it can be reported
    Unrecognized(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::InArray => "in_array",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for Operator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "greater_than" => Self::GreaterThan,
            "less_than" => Self::LessThan,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            "in_array" => Self::InArray,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Node of the layout tree, tagged by its `component` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLayoutNode", into = "RawLayoutNode")]
pub enum LayoutNode {
    /// Slot for the field whose `id` is `field_id`
    Field { id: String, field_id: String },
    /// Grouping element; children keep their declaration order
    Container {
        id: String,
        element: Option<String>,
        attributes: Map<String, Value>,
        children: Vec<LayoutNode>,
    },
    /// Any component name the interpreter does not know
    Unknown { id: String, component: String },
}

impl LayoutNode {
    pub fn field(id: impl Into<String>, field_id: impl Into<String>) -> Self {
        Self::Field { id: id.into(), field_id: field_id.into() }
    }

    pub fn container(id: impl Into<String>, children: Vec<LayoutNode>) -> Self {
        Self::Container {
            id: id.into(),
            element: None,
            attributes: Map::new(),
            children,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Field { id, .. } | Self::Container { id, .. } | Self::Unknown { id, .. } => id,
        }
    }

    pub fn children(&self) -> &[LayoutNode] {
        match self {
            Self::Container { children, .. } => children,
            _ => &[],
        }
    }

    /// Number of levels in the tree rooted here (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(LayoutNode::depth).max().unwrap_or(0)
    }

    /// Pre-order walk
    pub fn visit<F: FnMut(&LayoutNode)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLayoutNode {
    #[serde(default)]
    id: String,
    component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<LayoutNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field_id: Option<String>,
}

impl TryFrom<RawLayoutNode> for LayoutNode {
    type Error = String;

    fn try_from(raw: RawLayoutNode) -> Result<Self, Self::Error> {
        match raw.component.as_str() {
            "field" => {
                let field_id = raw
                    .field_id
                    .ok_or_else(|| format!("layout node '{}' is a field without fieldId", raw.id))?;
                Ok(Self::Field { id: raw.id, field_id })
            }
            "container" => Ok(Self::Container {
                id: raw.id,
                element: raw.element,
                attributes: raw.attributes.unwrap_or_default(),
                children: raw.children.unwrap_or_default(),
            }),
            _ => Ok(Self::Unknown { id: raw.id, component: raw.component }),
        }
    }
}

impl From<LayoutNode> for RawLayoutNode {
    fn from(node: LayoutNode) -> Self {
        let empty = |id: String, component: &str| RawLayoutNode {
            id,
            component: component.to_string(),
            element: None,
            attributes: None,
            children: None,
            field_id: None,
        };
        match node {
            LayoutNode::Field { id, field_id } => RawLayoutNode {
                field_id: Some(field_id),
                ..empty(id, "field")
            },
            LayoutNode::Container { id, element, attributes, children } => RawLayoutNode {
                element,
                attributes: Some(attributes),
                children: Some(children),
                ..empty(id, "container")
            },
            LayoutNode::Unknown { id, component } => empty(id, &component),
        }
    }
}
