//! Field kind → widget registry
//!
//! A miss is an ordinary outcome: the interpreter turns it into an
//! "unknown field type" placeholder.

use serde::Serialize;
use std::collections::HashMap;

use formtitan_core::FieldType;

/// Presentation-neutral description of the control a renderer should build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "widget", rename_all = "camelCase")]
pub enum Widget {
    /// Single-line input; `input_type` is the HTML-style input type
    #[serde(rename_all = "camelCase")]
    Input { input_type: String },
    TextArea { rows: u32 },
    Select,
    /// One box, or one box per option when `multiple`
    Checkbox { multiple: bool },
    Radio,
    Date,
    /// Host-defined control
    Custom { name: String },
}

#[derive(Debug, Clone)]
pub struct FieldKindRegistry {
    kinds: HashMap<String, Widget>,
}

impl FieldKindRegistry {
    pub fn empty() -> Self {
        Self { kinds: HashMap::new() }
    }

    /// Registry covering every built-in field type
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for input_type in ["text", "email", "tel", "password", "number", "url"] {
            registry.register(input_type, Widget::Input { input_type: input_type.to_string() });
        }
        registry.register("textarea", Widget::TextArea { rows: 4 });
        registry.register("select", Widget::Select);
        registry.register("checkbox", Widget::Checkbox { multiple: false });
        registry.register("radio", Widget::Radio);
        registry.register("date", Widget::Date);
        registry
    }

    /// Register (or replace) the widget for a type name
    pub fn register(&mut self, type_name: impl Into<String>, widget: Widget) -> Option<Widget> {
        self.kinds.insert(type_name.into(), widget)
    }

    pub fn lookup(&self, field_type: &FieldType) -> Option<&Widget> {
        self.kinds.get(field_type.as_str())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.kinds.contains_key(type_name)
    }
}

impl Default for FieldKindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
