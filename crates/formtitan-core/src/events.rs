//! Typed publish/subscribe for form lifecycle events
//!
//! Subscribers register for one [`EventKind`] or for everything. A
//! subscriber that panics is logged and skipped; the remaining subscribers
//! still receive the event.
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle of a form engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormStatus {
    Idle,
    Loading,
    Ready,
    LoadError,
    Submitting,
    Submitted,
    SubmitError,
}

impl FormStatus {
    /// Whether the form accepts edits and submissions
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::Submitted | Self::SubmitError)
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::LoadError => "loadError",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::SubmitError => "submitError",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FormEvent {
    #[serde(rename_all = "camelCase")]
    FieldChange { name: String, value: Value, data: Value },
    #[serde(rename_all = "camelCase")]
    ErrorChange {
        name: String,
        error: Option<String>,
        errors: BTreeMap<String, String>,
    },
    ErrorsCleared,
    FormReset,
    #[serde(rename_all = "camelCase")]
    VisibilityChange { field_id: String, visible: bool },
    StatusChange { from: FormStatus, to: FormStatus },
    #[serde(rename_all = "camelCase")]
    FormLoaded { form_id: String, name: String },
    FormRendered,
    ValidationFailed { errors: BTreeMap<String, String> },
    FormSubmitted { data: Value, result: Value },
    Message { id: u64, text: String, kind: MessageKind },
    MessageExpired { id: u64 },
    Error { message: String, detail: String },
}

/// Discriminant of [`FormEvent`], used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FieldChange,
    ErrorChange,
    ErrorsCleared,
    FormReset,
    VisibilityChange,
    StatusChange,
    FormLoaded,
    FormRendered,
    ValidationFailed,
    FormSubmitted,
    Message,
    MessageExpired,
    Error,
}

impl FormEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FieldChange { .. } => EventKind::FieldChange,
            Self::ErrorChange { .. } => EventKind::ErrorChange,
            Self::ErrorsCleared => EventKind::ErrorsCleared,
            Self::FormReset => EventKind::FormReset,
            Self::VisibilityChange { .. } => EventKind::VisibilityChange,
            Self::StatusChange { .. } => EventKind::StatusChange,
            Self::FormLoaded { .. } => EventKind::FormLoaded,
            Self::FormRendered => EventKind::FormRendered,
            Self::ValidationFailed { .. } => EventKind::ValidationFailed,
            Self::FormSubmitted { .. } => EventKind::FormSubmitted,
            Self::Message { .. } => EventKind::Message,
            Self::MessageExpired { .. } => EventKind::MessageExpired,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&FormEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    handler: Handler,
}

/// Event dispatcher shared by a form engine and its subscribers
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        self.insert(Some(kind), Arc::new(handler))
    }

    /// Subscribe to every event
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FormEvent) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Deliver an event; returns how many subscribers handled it cleanly.
    ///
    /// Handlers run without the subscriber list locked, so they may
    /// subscribe, unsubscribe or emit from inside a callback.
    pub fn emit(&self, event: &FormEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            subscribers
                .iter()
                .filter(|s| s.filter.map_or(true, |k| k == kind))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::error!(event = ?kind, "event subscriber panicked; continuing dispatch"),
            }
        }
        delivered
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = FormEvent>) {
        for event in events {
            self.emit(&event);
        }
    }

    fn insert(&self, filter: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, filter, handler });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
