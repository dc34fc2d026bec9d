//! Layout-tree resolution
//!
//! Walks the declarative layout and produces the concrete tree a renderer
//! draws. Field slots resolve through the field registry and are dropped
//! while invisible; anything that cannot be resolved becomes a visible
//! placeholder instead of vanishing.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use formtitan_core::{FieldDefinition, FormDefinition, FormError, LayoutNode, MAX_LAYOUT_DEPTH};

use crate::kinds::{FieldKindRegistry, Widget};

/// Container ids whose text comes from the form metadata
pub const TITLE_SLOT: &str = "title";
pub const SUBTITLE_SLOT: &str = "subtitle";

const DEFAULT_ELEMENT: &str = "div";
const DEFAULT_TITLE: &str = "Form";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderableNode {
    #[serde(rename_all = "camelCase")]
    Field {
        node_id: String,
        field: FieldDefinition,
        widget: Widget,
    },
    #[serde(rename_all = "camelCase")]
    Container {
        node_id: String,
        element: String,
        attributes: Map<String, Value>,
        text: Option<String>,
        children: Vec<RenderableNode>,
    },
    #[serde(rename_all = "camelCase")]
    Placeholder { node_id: String, diagnostic: Diagnostic },
}

impl RenderableNode {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Field { node_id, .. }
            | Self::Container { node_id, .. }
            | Self::Placeholder { node_id, .. } => node_id,
        }
    }

    pub fn children(&self) -> &[RenderableNode] {
        match self {
            Self::Container { children, .. } => children,
            _ => &[],
        }
    }

    /// Ids of the rendered fields, in display order
    pub fn field_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(&mut |node| {
            if let Self::Field { field, .. } = node {
                ids.push(field.id.as_str());
            }
        });
        ids
    }

    /// Every placeholder diagnostic, in display order
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let Self::Placeholder { diagnostic, .. } = node {
                found.push(diagnostic);
            }
        });
        found
    }

    /// First node with the given layout id
    pub fn find(&self, node_id: &str) -> Option<&RenderableNode> {
        if self.node_id() == node_id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(node_id))
    }

    fn walk<'a, F: FnMut(&'a RenderableNode)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// Why a layout node rendered as a placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum Diagnostic {
    #[serde(rename_all = "camelCase")]
    UnknownField { field_id: String },
    #[serde(rename_all = "camelCase")]
    UnknownFieldType { field_id: String, type_name: String },
    UnknownComponent { component: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownField { field_id } => write!(f, "Field with ID {} not found", field_id),
            Self::UnknownFieldType { type_name, .. } => write!(f, "Unknown field type: {}", type_name),
            Self::UnknownComponent { component } => write!(f, "Unknown layout component: {}", component),
        }
    }
}

/// Everything a resolution pass reads
pub struct LayoutContext<'a> {
    fields: HashMap<&'a str, &'a FieldDefinition>,
    visibility: &'a BTreeMap<String, bool>,
    name: &'a str,
    description: Option<&'a str>,
    kinds: &'a FieldKindRegistry,
}

impl<'a> LayoutContext<'a> {
    pub fn new(
        definition: &'a FormDefinition,
        visibility: &'a BTreeMap<String, bool>,
        kinds: &'a FieldKindRegistry,
    ) -> Self {
        Self {
            fields: definition.fields.iter().map(|f| (f.id.as_str(), f)).collect(),
            visibility,
            name: &definition.name,
            description: definition.description.as_deref(),
            kinds,
        }
    }

    /// Fields without an entry in the visibility map count as visible
    fn is_visible(&self, field_id: &str) -> bool {
        self.visibility.get(field_id).copied().unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutInterpreter {
    max_depth: usize,
}

impl Default for LayoutInterpreter {
    fn default() -> Self {
        Self { max_depth: MAX_LAYOUT_DEPTH }
    }
}

impl LayoutInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Resolve a layout tree. `Ok(None)` means the node is absent (an
    /// invisible field at the root).
    pub fn resolve(
        &self,
        node: &LayoutNode,
        ctx: &LayoutContext<'_>,
    ) -> Result<Option<RenderableNode>, FormError> {
        self.resolve_at(node, ctx, 1)
    }

    fn resolve_at(
        &self,
        node: &LayoutNode,
        ctx: &LayoutContext<'_>,
        depth: usize,
    ) -> Result<Option<RenderableNode>, FormError> {
        if depth > self.max_depth {
            return Err(FormError::MalformedLayout {
                node_id: node.id().to_string(),
                max: self.max_depth,
            });
        }

        match node {
            LayoutNode::Field { id, field_id } => Ok(self.resolve_field(id, field_id, ctx)),
            LayoutNode::Container { id, element, attributes, children } => {
                let mut resolved = Vec::with_capacity(children.len());
                for child in children {
                    if let Some(child) = self.resolve_at(child, ctx, depth + 1)? {
                        resolved.push(child);
                    }
                }

                Ok(Some(RenderableNode::Container {
                    node_id: id.clone(),
                    element: element.clone().unwrap_or_else(|| DEFAULT_ELEMENT.to_string()),
                    attributes: attributes.clone(),
                    text: slot_text(id, children.is_empty(), ctx),
                    children: resolved,
                }))
            }
            LayoutNode::Unknown { id, component } => {
                tracing::warn!(node = %id, component = %component, "unknown layout component");
                Ok(Some(RenderableNode::Placeholder {
                    node_id: id.clone(),
                    diagnostic: Diagnostic::UnknownComponent { component: component.clone() },
                }))
            }
        }
    }

    fn resolve_field(&self, node_id: &str, field_id: &str, ctx: &LayoutContext<'_>) -> Option<RenderableNode> {
        let Some(field) = ctx.fields.get(field_id).copied() else {
            tracing::warn!(node = %node_id, field_id = %field_id, "layout references an unknown field");
            return Some(RenderableNode::Placeholder {
                node_id: node_id.to_string(),
                diagnostic: Diagnostic::UnknownField { field_id: field_id.to_string() },
            });
        };

        if !ctx.is_visible(field_id) {
            return None;
        }

        let Some(widget) = ctx.kinds.lookup(&field.field_type) else {
            tracing::warn!(field_id = %field_id, field_type = %field.field_type, "field type not registered");
            return Some(RenderableNode::Placeholder {
                node_id: node_id.to_string(),
                diagnostic: Diagnostic::UnknownFieldType {
                    field_id: field_id.to_string(),
                    type_name: field.field_type.to_string(),
                },
            });
        };

        let widget = match widget {
            Widget::Checkbox { .. } => Widget::Checkbox { multiple: !field.options().is_empty() },
            other => other.clone(),
        };

        Some(RenderableNode::Field {
            node_id: node_id.to_string(),
            field: field.clone(),
            widget,
        })
    }
}

/// Text for the `title` / `subtitle` slots; only childless nodes qualify
fn slot_text(id: &str, childless: bool, ctx: &LayoutContext<'_>) -> Option<String> {
    if !childless {
        return None;
    }
    match id {
        TITLE_SLOT if ctx.name.is_empty() => Some(DEFAULT_TITLE.to_string()),
        TITLE_SLOT => Some(ctx.name.to_string()),
        SUBTITLE_SLOT => Some(ctx.description.unwrap_or_default().to_string()),
        _ => None,
    }
}
