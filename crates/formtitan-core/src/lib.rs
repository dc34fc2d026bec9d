//! Form-Titan Core: definition model, form state and events
//!
//! Presentation-independent building blocks shared by the rule engines,
//! the layout interpreter and the form engine.

pub mod definition;
pub mod error;
pub mod events;
pub mod state;
pub mod value;

pub use definition::{
    FieldDefinition, FieldOption, FieldType, FormConfig, FormDefinition, LayoutNode,
    CustomRule, Operator, ValidationSpec, VisibilityRule,
};
pub use error::FormError;
pub use events::{EventBus, EventKind, FormEvent, FormStatus, MessageKind, SubscriptionId};
pub use state::FormState;

/// Engine version
pub const FORMTITAN_VERSION: &str = "1.0.0";

/// Maximum nesting accepted for layout trees
pub const MAX_LAYOUT_DEPTH: usize = 64;
