//! Form State: values, errors and touched flags for one form
//!
//! Mutations never dispatch events directly. They queue them, and the
//! owner drains the queue with [`FormState::drain_events`] once it has
//! released whatever lock guards the state.
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::events::FormEvent;
use crate::value::{get_path, set_path};

#[derive(Debug, Clone)]
pub struct FormState {
    data: Value,
    errors: BTreeMap<String, String>,
    touched: BTreeSet<String>,
    pending: Vec<FormEvent>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new()
    }
}

impl FormState {
    pub fn new() -> Self {
        Self::with_data(Map::new())
    }

    pub fn with_data(initial: Map<String, Value>) -> Self {
        Self {
            data: Value::Object(initial),
            errors: BTreeMap::new(),
            touched: BTreeSet::new(),
            pending: Vec::new(),
        }
    }

    /// Value at a dotted name, `None` when any level is missing
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        get_path(&self.data, name)
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    /// Store a value, mark the name touched and queue `FieldChange`
    pub fn set_value(&mut self, name: &str, value: Value) {
        set_path(&mut self.data, name, value.clone());
        self.touched.insert(name.to_string());
        self.pending.push(FormEvent::FieldChange {
            name: name.to_string(),
            value,
            data: self.data.clone(),
        });
    }

    /// Store a default. Existing values win; nothing is touched or queued.
    pub fn seed(&mut self, name: &str, value: Value) -> bool {
        if self.has_value(name) {
            return false;
        }
        set_path(&mut self.data, name, value);
        true
    }

    pub fn get_error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    /// Record or clear an error and queue `ErrorChange`.
    ///
    /// An empty message clears the error.
    pub fn set_error(&mut self, name: &str, error: Option<String>) {
        let error = error.filter(|message| !message.is_empty());
        match &error {
            Some(message) => {
                self.errors.insert(name.to_string(), message.clone());
            }
            None => {
                self.errors.remove(name);
            }
        }
        self.pending.push(FormEvent::ErrorChange {
            name: name.to_string(),
            error,
            errors: self.errors.clone(),
        });
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.pending.push(FormEvent::ErrorsCleared);
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Mark a name touched without changing its value (blur)
    pub fn touch(&mut self, name: &str) {
        self.touched.insert(name.to_string());
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Owned snapshot of the data; later mutations do not affect it
    pub fn get_data(&self) -> Value {
        self.data.clone()
    }

    /// Borrowed view of the data for read-only evaluation
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Clear data, errors and touched flags and queue `FormReset`
    pub fn reset(&mut self) {
        self.data = Value::Object(Map::new());
        self.errors.clear();
        self.touched.clear();
        self.pending.push(FormEvent::FormReset);
    }

    /// Take the events queued since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.pending)
    }
}
