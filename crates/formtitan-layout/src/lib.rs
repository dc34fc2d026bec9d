//! Form-Titan Layout: resolves a layout tree into a renderable tree
//!
//! # Example
//!
//! ```
//! use formtitan_core::FormDefinition;
//! use formtitan_layout::{FieldKindRegistry, LayoutContext, LayoutInterpreter};
//! use std::collections::BTreeMap;
//!
//! let definition = FormDefinition::from_json(r#"{
//!     "formId": "demo",
//!     "name": "Demo",
//!     "fields": [{ "id": "q", "name": "q", "type": "text", "label": "Question" }],
//!     "layoutDefinition": {
//!         "id": "root", "component": "container",
//!         "children": [{ "id": "q_slot", "component": "field", "fieldId": "q" }]
//!     }
//! }"#).unwrap();
//!
//! let visibility = BTreeMap::new();
//! let kinds = FieldKindRegistry::default();
//! let ctx = LayoutContext::new(&definition, &visibility, &kinds);
//! let tree = LayoutInterpreter::new()
//!     .resolve(&definition.layout_definition, &ctx)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(tree.field_ids(), vec!["q"]);
//! ```

pub mod interpreter;
pub mod kinds;
pub mod outline;

pub use interpreter::{Diagnostic, LayoutContext, LayoutInterpreter, RenderableNode, SUBTITLE_SLOT, TITLE_SLOT};
pub use kinds::{FieldKindRegistry, Widget};
pub use outline::render_outline;
