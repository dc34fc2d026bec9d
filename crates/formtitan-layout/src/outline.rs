//! Plain-text outline of a resolved tree
//!
//! Used for previews and in tests; each line is one node, indented by
//! depth, with field values and errors taken from the form state.

use std::fmt::Write;

use formtitan_core::value::display_string;
use formtitan_core::FormState;

use crate::interpreter::RenderableNode;

const INDENT: &str = "  ";

pub fn render_outline(tree: &RenderableNode, state: &FormState) -> String {
    let mut out = String::new();
    write_node(&mut out, tree, state, 0);
    out
}

fn write_node(out: &mut String, node: &RenderableNode, state: &FormState, depth: usize) {
    let pad = INDENT.repeat(depth);
    match node {
        RenderableNode::Container { node_id, element, text, children, .. } => {
            let _ = write!(out, "{}<{} #{}>", pad, element, node_id);
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                let _ = write!(out, " {}", text);
            }
            out.push('\n');
            for child in children {
                write_node(out, child, state, depth + 1);
            }
        }
        RenderableNode::Field { field, .. } => {
            let marker = if field.is_required() { " *" } else { "" };
            let value = state
                .get_value(&field.name)
                .map(display_string)
                .unwrap_or_default();
            let _ = writeln!(out, "{}{}{} [{}]: {}", pad, field.label, marker, field.field_type, value);
            if let Some(error) = state.get_error(&field.name) {
                let _ = writeln!(out, "{}{}! {}", pad, INDENT, error);
            }
        }
        RenderableNode::Placeholder { diagnostic, .. } => {
            let _ = writeln!(out, "{}?? {}", pad, diagnostic);
        }
    }
}
