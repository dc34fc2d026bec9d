//! Form Engine: load / edit / validate / submit lifecycle
//!
//! ```text
//! idle → loading → ready ──submit──▶ submitting → submitted
//!           │        ▲                   │
//!           ▼        └───── edits ───────┴──────▶ submitError
//!       loadError
//! ```
//!
//! All methods take `&self`. Mutable state sits behind one mutex that is
//! never held across an await; the engine only suspends inside the
//! [`Transport`] calls. Events are queued while the lock is held and
//! dispatched after it is released, so subscribers may call back in.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use formtitan_core::{
    EventBus, EventKind, FieldDefinition, FormDefinition, FormError, FormEvent, FormState,
    FormStatus, MessageKind, SubscriptionId,
};
use formtitan_layout::{FieldKindRegistry, LayoutContext, LayoutInterpreter, RenderableNode, Widget};
use formtitan_rules::{ValidationEngine, VisibilityEngine};

use crate::options::{EngineOptions, ValidationScope};
use crate::renderer::{Renderer, StatusMessage};
use crate::transport::{SubmissionPayload, SubmitResponse, Transport};

pub const LOADING_MESSAGE: &str = "Loading form...";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load form";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit form";
pub const SUBMIT_SUCCESS_MESSAGE: &str = "Form submitted successfully!";
pub const FIX_ERRORS_MESSAGE: &str = "Please fix the errors above";

// ============================================================================
// Inputs and outcomes
// ============================================================================

/// What `load_form` starts from
#[derive(Debug, Clone)]
pub enum FormSource {
    /// Fetched through the transport
    Id(String),
    Definition(FormDefinition),
}

impl From<&str> for FormSource {
    fn from(form_id: &str) -> Self {
        Self::Id(form_id.to_string())
    }
}

impl From<String> for FormSource {
    fn from(form_id: String) -> Self {
        Self::Id(form_id)
    }
}

impl From<FormDefinition> for FormSource {
    fn from(definition: FormDefinition) -> Self {
        Self::Definition(definition)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { form_id: String },
    Failed(FormError),
    /// A later `load_form` call started before this one finished
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    NotReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Skipped(SkipReason),
    /// Validation failed; the transport was not called
    Invalid(BTreeMap<String, String>),
    Submitted(SubmitResponse),
    Failed(String),
}

// ============================================================================
// Engine
// ============================================================================

struct Inner {
    status: FormStatus,
    definition: Option<FormDefinition>,
    state: FormState,
    visibility: BTreeMap<String, bool>,
    tree: Option<RenderableNode>,
    seeded: HashSet<String>,
    message: Option<StatusMessage>,
    next_message_id: u64,
    renderer: Option<Box<dyn Renderer>>,
    outbox: Vec<FormEvent>,
}

impl Inner {
    fn new() -> Self {
        Self {
            status: FormStatus::Idle,
            definition: None,
            state: FormState::new(),
            visibility: BTreeMap::new(),
            tree: None,
            seeded: HashSet::new(),
            message: None,
            next_message_id: 0,
            renderer: None,
            outbox: Vec::new(),
        }
    }

    /// Queue an engine event behind whatever the state already queued
    fn push(&mut self, event: FormEvent) {
        let queued = self.state.drain_events();
        self.outbox.extend(queued);
        self.outbox.push(event);
    }

    fn drain(&mut self) -> Vec<FormEvent> {
        let queued = self.state.drain_events();
        self.outbox.extend(queued);
        std::mem::take(&mut self.outbox)
    }

    fn set_status(&mut self, to: FormStatus) {
        let from = self.status;
        if from != to {
            tracing::debug!(%from, %to, "form status");
            self.status = to;
            self.push(FormEvent::StatusChange { from, to });
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the submit flag however the submit future ends
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FormEngine<T: Transport> {
    transport: T,
    options: EngineOptions,
    validator: ValidationEngine,
    visibility: VisibilityEngine,
    interpreter: LayoutInterpreter,
    kinds: FieldKindRegistry,
    events: Arc<EventBus>,
    inner: Arc<Mutex<Inner>>,
    submitting: AtomicBool,
    load_generation: AtomicU64,
}

impl<T: Transport> FormEngine<T> {
    pub fn new(transport: T, options: EngineOptions) -> Self {
        Self {
            transport,
            options,
            validator: ValidationEngine::new(),
            visibility: VisibilityEngine::new(),
            interpreter: LayoutInterpreter::new(),
            kinds: FieldKindRegistry::with_builtins(),
            events: Arc::new(EventBus::new()),
            inner: Arc::new(Mutex::new(Inner::new())),
            submitting: AtomicBool::new(false),
            load_generation: AtomicU64::new(0),
        }
    }

    pub fn with_renderer<R: Renderer + 'static>(self, renderer: R) -> Self {
        self.set_renderer(renderer);
        self
    }

    /// Attach a renderer and draw the current tree with it
    pub fn set_renderer<R: Renderer + 'static>(&self, renderer: R) {
        let mut inner = lock(&self.inner);
        inner.renderer = Some(Box::new(renderer));
        draw(&mut inner);
    }

    /// Add or replace a named validation rule
    pub fn register_validator<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(Option<&Value>, &Value, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.validator.add_rule(name, rule);
    }

    /// Add or replace the widget for a field type
    pub fn register_field_kind(&mut self, type_name: impl Into<String>, widget: Widget) {
        self.kinds.register(type_name, widget);
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        self.events.on_any(handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.off(id)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Load a definition, fetching it first when given an id.
    ///
    /// When calls overlap, the one started last wins; earlier ones return
    /// [`LoadOutcome::Superseded`] without touching the engine.
    pub async fn load_form(&self, source: impl Into<FormSource>) -> LoadOutcome {
        let generation = self.load_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let source = source.into();

        self.update(|inner| {
            inner.set_status(FormStatus::Loading);
            if self.options.show_loading_states {
                self.show_message(inner, LOADING_MESSAGE, MessageKind::Info);
            }
        });

        let fetched = match source {
            FormSource::Definition(definition) => Ok(definition),
            FormSource::Id(form_id) => {
                tracing::info!(form_id = %form_id, "fetching form definition");
                self.transport.fetch_definition(&form_id).await.map_err(FormError::from)
            }
        };
        let checked = fetched.and_then(|definition| {
            definition.check()?;
            self.validator.check_patterns(&definition)?;
            Ok(definition)
        });

        self.update(|inner| {
            if self.load_generation.load(Ordering::Acquire) != generation {
                tracing::debug!(generation, "discarding superseded load");
                return LoadOutcome::Superseded;
            }

            match checked {
                Ok(definition) => {
                    let form_id = definition.form_id.clone();
                    let name = definition.name.clone();
                    for missing in definition.unresolved_field_ids() {
                        tracing::warn!(form_id = %form_id, field_id = %missing, "layout references an unknown field");
                    }

                    inner.definition = Some(definition);
                    self.seed_defaults(inner);
                    inner.visibility = self.compute_visibility(inner);
                    self.rebuild(inner);
                    inner.push(FormEvent::FormRendered);

                    if inner.message.as_ref().map(|m| m.text.as_str()) == Some(LOADING_MESSAGE) {
                        clear_message(inner);
                    }
                    inner.set_status(FormStatus::Ready);
                    tracing::info!(form_id = %form_id, "form loaded");
                    inner.push(FormEvent::FormLoaded { form_id: form_id.clone(), name });
                    LoadOutcome::Loaded { form_id }
                }
                Err(err) => {
                    tracing::error!(error = %err, "form load failed");
                    inner.set_status(FormStatus::LoadError);
                    self.show_message(inner, LOAD_FAILED_MESSAGE, MessageKind::Error);
                    inner.push(FormEvent::Error {
                        message: LOAD_FAILED_MESSAGE.to_string(),
                        detail: err.user_message(),
                    });
                    LoadOutcome::Failed(err)
                }
            }
        })
    }

    /// Validate everything and, when clean, send the data.
    ///
    /// A call made while another is in flight returns immediately with
    /// [`SkipReason::InFlight`].
    pub async fn handle_submit(&self) -> SubmitOutcome {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("submit already in flight");
            return SubmitOutcome::Skipped(SkipReason::InFlight);
        }
        let _guard = SubmitGuard(&self.submitting);

        let prepared = self.update(|inner| {
            let form_id = match (&inner.definition, inner.status.is_ready()) {
                (Some(definition), true) => definition.form_id.clone(),
                _ => return Err(SubmitOutcome::Skipped(SkipReason::NotReady)),
            };

            let errors = self.write_errors(inner);
            if !errors.is_empty() {
                tracing::info!(form_id = %form_id, invalid = errors.len(), "submit blocked by validation");
                inner.push(FormEvent::ValidationFailed { errors: errors.clone() });
                self.show_message(inner, FIX_ERRORS_MESSAGE, MessageKind::Error);
                return Err(SubmitOutcome::Invalid(errors));
            }

            inner.set_status(FormStatus::Submitting);
            Ok((form_id, inner.state.get_data()))
        });
        let (form_id, data) = match prepared {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };

        let payload = SubmissionPayload { data };
        let result = self.transport.submit(&form_id, &payload).await;

        self.update(|inner| match result {
            Ok(response) => {
                tracing::info!(form_id = %form_id, "form submitted");
                inner.set_status(FormStatus::Submitted);
                inner.push(FormEvent::FormSubmitted {
                    data: payload.data,
                    result: serde_json::to_value(&response).unwrap_or_default(),
                });
                let text = if response.message.trim().is_empty() {
                    SUBMIT_SUCCESS_MESSAGE.to_string()
                } else {
                    response.message.clone()
                };
                self.show_message(inner, text, MessageKind::Success);
                if self.options.reset_on_submit {
                    self.reset_inner(inner);
                }
                SubmitOutcome::Submitted(response)
            }
            Err(err) => {
                tracing::error!(form_id = %form_id, error = %err, "submit failed");
                let detail = err.to_string();
                inner.set_status(FormStatus::SubmitError);
                self.show_message(inner, detail.clone(), MessageKind::Error);
                inner.push(FormEvent::Error {
                    message: SUBMIT_FAILED_MESSAGE.to_string(),
                    detail: detail.clone(),
                });
                SubmitOutcome::Failed(detail)
            }
        })
    }

    /// Full validation pass; writes the errors and returns whether it passed
    pub fn validate(&self) -> bool {
        self.update(|inner| {
            let errors = self.write_errors(inner);
            errors.is_empty()
        })
    }

    /// Clear values, errors and touched flags. Defaults are not re-seeded.
    pub fn reset_form(&self) {
        self.update(|inner| self.reset_inner(inner));
    }

    /// Resolve the tree again and redraw it
    pub fn render(&self) {
        self.update(|inner| {
            self.rebuild(inner);
            if inner.definition.is_some() {
                inner.push(FormEvent::FormRendered);
            }
        });
    }

    // ------------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------------

    /// Store a value at a dotted name, then recompute visibility and, when
    /// enabled, validate that field; all before returning.
    pub fn set_value(&self, name: &str, value: Value) {
        self.update(|inner| {
            inner.state.set_value(name, value);
            self.refresh_visibility(inner);
            if self.options.validate_on_change {
                self.validate_named(inner, name);
            }
            self.rebuild(inner);
        });
    }

    /// Apply each top-level key as a separate change
    pub fn set_form_data(&self, data: Map<String, Value>) {
        self.update(|inner| {
            let names: Vec<String> = data.keys().cloned().collect();
            for (name, value) in data {
                inner.state.set_value(&name, value);
            }
            self.refresh_visibility(inner);
            if self.options.validate_on_change {
                for name in &names {
                    self.validate_named(inner, name);
                }
            }
            self.rebuild(inner);
        });
    }

    /// Focus left a field
    pub fn blur_field(&self, name: &str) {
        self.update(|inner| {
            inner.state.touch(name);
            if self.options.validate_on_blur {
                self.validate_named(inner, name);
                self.rebuild(inner);
            }
        });
    }

    pub fn get_field(&self, field_id: &str) -> Option<FieldDefinition> {
        lock(&self.inner).definition.as_ref()?.field(field_id).cloned()
    }

    pub fn get_field_value(&self, name: &str) -> Option<Value> {
        lock(&self.inner).state.get_value(name).cloned()
    }

    pub fn get_form_data(&self) -> Value {
        lock(&self.inner).state.get_data()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn status(&self) -> FormStatus {
        lock(&self.inner).status
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn definition(&self) -> Option<FormDefinition> {
        lock(&self.inner).definition.clone()
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        lock(&self.inner).state.errors().clone()
    }

    pub fn get_error(&self, name: &str) -> Option<String> {
        lock(&self.inner).state.get_error(name).map(str::to_string)
    }

    /// Field id → visible
    pub fn visibility(&self) -> BTreeMap<String, bool> {
        lock(&self.inner).visibility.clone()
    }

    pub fn is_field_visible(&self, field_id: &str) -> bool {
        lock(&self.inner).visibility.get(field_id).copied().unwrap_or(true)
    }

    /// The tree last handed to the renderer
    pub fn visible_tree(&self) -> Option<RenderableNode> {
        lock(&self.inner).tree.clone()
    }

    pub fn current_message(&self) -> Option<StatusMessage> {
        lock(&self.inner).message.clone()
    }

    // ------------------------------------------------------------------------
    // Internals (all run with the state locked)
    // ------------------------------------------------------------------------

    /// Run `f` on the locked state, then dispatch what it queued
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, events) = {
            let mut inner = lock(&self.inner);
            let result = f(&mut *inner);
            (result, inner.drain())
        };
        self.events.emit_all(events);
        result
    }

    /// Defaults apply once per field id over the engine's lifetime
    fn seed_defaults(&self, inner: &mut Inner) {
        let Some(definition) = inner.definition.as_ref() else {
            return;
        };
        for field in &definition.fields {
            let Some(default) = field.default_value.as_ref() else {
                continue;
            };
            if inner.seeded.insert(field.id.clone()) {
                inner.state.seed(&field.name, default.clone());
            }
        }
    }

    fn compute_visibility(&self, inner: &Inner) -> BTreeMap<String, bool> {
        match inner.definition.as_ref() {
            Some(definition) => self.visibility.visibility_map(&definition.fields, inner.state.data()),
            None => BTreeMap::new(),
        }
    }

    /// Recompute the visibility map and queue a change per flipped field
    fn refresh_visibility(&self, inner: &mut Inner) {
        let next = self.compute_visibility(inner);
        let previous = std::mem::replace(&mut inner.visibility, next);
        let flipped: Vec<(String, bool)> = inner
            .visibility
            .iter()
            .filter(|(id, visible)| previous.get(*id).copied().unwrap_or(true) != **visible)
            .map(|(id, visible)| (id.clone(), *visible))
            .collect();
        for (field_id, visible) in flipped {
            inner.push(FormEvent::VisibilityChange { field_id, visible });
        }
    }

    /// Resolve the visible tree and hand it to the renderer
    fn rebuild(&self, inner: &mut Inner) {
        inner.tree = match inner.definition.as_ref() {
            Some(definition) => {
                let ctx = LayoutContext::new(definition, &inner.visibility, &self.kinds);
                match self.interpreter.resolve(&definition.layout_definition, &ctx) {
                    Ok(tree) => tree,
                    Err(err) => {
                        tracing::error!(error = %err, "layout resolution failed");
                        None
                    }
                }
            }
            None => None,
        };
        draw(inner);
    }

    fn validate_named(&self, inner: &mut Inner, name: &str) {
        let Some(field) = inner.definition.as_ref().and_then(|d| d.field_by_name(name)) else {
            return;
        };
        let error = self
            .validator
            .validate_field(field, inner.state.get_value(name), inner.state.data());
        if inner.state.get_error(name) != error.as_deref() {
            inner.state.set_error(name, error);
        }
    }

    /// Replace the stored errors with a fresh full pass
    fn write_errors(&self, inner: &mut Inner) -> BTreeMap<String, String> {
        let errors = match inner.definition.as_ref() {
            Some(definition) => {
                let data = inner.state.data();
                match self.options.validation_scope {
                    ValidationScope::AllFields => self.validator.validate_all(&definition.fields, data),
                    ValidationScope::VisibleOnly => self.validator.validate_all(
                        definition
                            .fields
                            .iter()
                            .filter(|f| inner.visibility.get(&f.id).copied().unwrap_or(true)),
                        data,
                    ),
                }
            }
            None => BTreeMap::new(),
        };

        inner.state.clear_errors();
        for (name, error) in &errors {
            inner.state.set_error(name, Some(error.clone()));
        }
        self.rebuild(inner);
        errors
    }

    fn reset_inner(&self, inner: &mut Inner) {
        inner.state.reset();
        self.refresh_visibility(inner);
        self.rebuild(inner);
        inner.push(FormEvent::FormRendered);
    }

    /// Replace the status message; it expires after `message_ttl_ms`
    fn show_message(&self, inner: &mut Inner, text: impl Into<String>, kind: MessageKind) {
        inner.next_message_id += 1;
        let message = StatusMessage { id: inner.next_message_id, text: text.into(), kind };
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.show_message(&message);
        }
        inner.push(FormEvent::Message { id: message.id, text: message.text.clone(), kind });
        let id = message.id;
        inner.message = Some(message);
        self.schedule_expiry(id);
    }

    fn schedule_expiry(&self, id: u64) {
        if self.options.message_ttl_ms == 0 {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(message_id = id, "no runtime; message will not expire");
            return;
        };

        let ttl = Duration::from_millis(self.options.message_ttl_ms);
        let inner = Arc::clone(&self.inner);
        let events = Arc::clone(&self.events);
        runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let expired = {
                let mut inner = lock(&inner);
                if inner.message.as_ref().map(|m| m.id) == Some(id) {
                    clear_message(&mut inner);
                    true
                } else {
                    false
                }
            };
            if expired {
                events.emit(&FormEvent::MessageExpired { id });
            }
        });
    }
}

fn draw(inner: &mut Inner) {
    if let Some(renderer) = inner.renderer.as_mut() {
        renderer.render(inner.tree.as_ref(), &inner.state);
    }
}

fn clear_message(inner: &mut Inner) {
    if let Some(message) = inner.message.take() {
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.clear_message(message.id);
        }
    }
}

impl<T: Transport> std::fmt::Debug for FormEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("FormEngine")
            .field("status", &inner.status)
            .field("form_id", &inner.definition.as_ref().map(|d| d.form_id.as_str()))
            .field("events", &self.events)
            .finish()
    }
}
