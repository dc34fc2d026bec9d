//! Presentation adapter contract

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

use formtitan_core::{FormState, MessageKind};
use formtitan_layout::{render_outline, RenderableNode};

/// Transient status line shown above the form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub id: u64,
    pub text: String,
    pub kind: MessageKind,
}

/// Draws the visible tree. Called with the engine's state locked, so an
/// implementation must not call back into the engine.
pub trait Renderer: Send {
    /// `tree` is `None` when nothing is visible or no form is loaded
    fn render(&mut self, tree: Option<&RenderableNode>, state: &FormState);

    fn show_message(&mut self, _message: &StatusMessage) {}

    fn clear_message(&mut self, _id: u64) {}
}

/// Keeps the latest plain-text outline and status line.
///
/// Clones share the same output, so a caller can keep one handle and give
/// the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct OutlineRenderer {
    output: Arc<Mutex<OutlineOutput>>,
}

#[derive(Debug, Default)]
struct OutlineOutput {
    outline: String,
    message: Option<StatusMessage>,
    renders: usize,
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outline(&self) -> String {
        self.output().outline.clone()
    }

    pub fn message(&self) -> Option<StatusMessage> {
        self.output().message.clone()
    }

    pub fn render_count(&self) -> usize {
        self.output().renders
    }

    fn output(&self) -> std::sync::MutexGuard<'_, OutlineOutput> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Renderer for OutlineRenderer {
    fn render(&mut self, tree: Option<&RenderableNode>, state: &FormState) {
        let outline = tree.map(|t| render_outline(t, state)).unwrap_or_default();
        let mut output = self.output();
        output.outline = outline;
        output.renders += 1;
    }

    fn show_message(&mut self, message: &StatusMessage) {
        self.output().message = Some(message.clone());
    }

    fn clear_message(&mut self, id: u64) {
        let mut output = self.output();
        if output.message.as_ref().map(|m| m.id) == Some(id) {
            output.message = None;
        }
    }
}
