use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formtitan_core::{EventKind, FormDefinition, FormError, FormEvent, FormStatus, MessageKind};
use formtitan_engine::{
    EngineOptions, FormEngine, LoadOutcome, OutlineRenderer, SkipReason, SubmissionPayload,
    SubmitOutcome, SubmitResponse, Transport, TransportError, ValidationScope,
};
use formtitan_layout::Widget;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Clone)]
struct MockTransport {
    forms: HashMap<String, (FormDefinition, u64)>,
    submit_delay_ms: u64,
    submit_result: Result<SubmitResponse, TransportError>,
    submit_calls: Arc<AtomicUsize>,
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            forms: HashMap::new(),
            submit_delay_ms: 0,
            submit_result: Ok(SubmitResponse::new("Thanks! We'll be in touch.")),
            submit_calls: Arc::new(AtomicUsize::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_form(mut self, definition: FormDefinition, delay_ms: u64) -> Self {
        self.forms.insert(definition.form_id.clone(), (definition, delay_ms));
        self
    }

    fn with_submit_delay(mut self, delay_ms: u64) -> Self {
        self.submit_delay_ms = delay_ms;
        self
    }

    fn failing_submit(mut self, err: TransportError) -> Self {
        self.submit_result = Err(err);
        self
    }
}

impl Transport for MockTransport {
    async fn fetch_definition(&self, form_id: &str) -> Result<FormDefinition, TransportError> {
        let Some((definition, delay_ms)) = self.forms.get(form_id) else {
            return Err(TransportError::status(404, Some("Form not found".to_string())));
        };
        tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        Ok(definition.clone())
    }

    async fn submit(
        &self,
        _form_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmitResponse, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.data.clone());
        tokio::time::sleep(Duration::from_millis(self.submit_delay_ms)).await;
        self.submit_result.clone()
    }
}

fn contact_form() -> FormDefinition {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../forms/contact-us-v1.json");
    FormDefinition::load(path.to_str().unwrap()).unwrap()
}

fn address_form() -> FormDefinition {
    serde_json::from_value(json!({
        "formId": "address-v1",
        "name": "Address",
        "fields": [
            {
                "id": "country", "name": "country", "type": "select", "label": "Country",
                "options": [{ "value": "US", "label": "United States" }, { "value": "CA", "label": "Canada" }]
            },
            {
                "id": "state", "name": "state", "type": "text", "label": "State",
                "validation": { "required": true },
                "visibility": [{ "field": "country", "operator": "equals", "value": "US" }]
            },
            {
                "id": "newsletter", "name": "newsletter", "type": "checkbox", "label": "Newsletter",
                "defaultValue": true
            }
        ],
        "layoutDefinition": {
            "id": "root", "component": "container",
            "children": [
                { "id": "country_field", "component": "field", "fieldId": "country" },
                { "id": "state_field", "component": "field", "fieldId": "state" },
                { "id": "newsletter_field", "component": "field", "fieldId": "newsletter" }
            ]
        }
    }))
    .unwrap()
}

fn fill_contact(engine: &FormEngine<MockTransport>) {
    engine.set_value("first_name", json!("Ada"));
    engine.set_value("last_name", json!("Lovelace"));
    engine.set_value("email", json!("ada@example.com"));
    engine.set_value("message", json!("Hello there, Form-Titan!"));
    engine.set_value("contact_method", json!("email"));
}

fn quiet_options() -> EngineOptions {
    EngineOptions::default().with_loading_states(false)
}

fn record(engine: &FormEngine<MockTransport>) -> Arc<Mutex<Vec<FormEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.on_any(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_load_by_id() {
    let transport = MockTransport::new().with_form(contact_form(), 0);
    let renderer = OutlineRenderer::new();
    let engine = FormEngine::new(transport, EngineOptions::default()).with_renderer(renderer.clone());
    let events = record(&engine);

    let outcome = engine.load_form("contact-us-v1").await;

    assert_eq!(outcome, LoadOutcome::Loaded { form_id: "contact-us-v1".to_string() });
    assert_eq!(engine.status(), FormStatus::Ready);
    assert!(engine.current_message().is_none());
    assert!(renderer.outline().contains("First Name * [text]: "));
    assert!(renderer.outline().contains("<h1 #title> Contact Us Form"));

    let events = events.lock().unwrap();
    assert!(events.contains(&FormEvent::StatusChange { from: FormStatus::Idle, to: FormStatus::Loading }));
    assert!(events.contains(&FormEvent::FormLoaded {
        form_id: "contact-us-v1".to_string(),
        name: "Contact Us Form".to_string(),
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        FormEvent::Message { text, kind: MessageKind::Info, .. } if text == "Loading form..."
    )));
}

#[tokio::test]
async fn test_load_error_surfaces_event_and_message() {
    let engine = FormEngine::new(MockTransport::new(), EngineOptions::default());
    let events = record(&engine);

    let outcome = engine.load_form("missing-form").await;

    assert_eq!(outcome, LoadOutcome::Failed(FormError::Network("Form not found".to_string())));
    assert_eq!(engine.status(), FormStatus::LoadError);
    assert_eq!(engine.current_message().unwrap().text, "Failed to load form");
    assert!(events.lock().unwrap().contains(&FormEvent::Error {
        message: "Failed to load form".to_string(),
        detail: "Form not found".to_string(),
    }));

    assert_eq!(engine.handle_submit().await, SubmitOutcome::Skipped(SkipReason::NotReady));
}

#[tokio::test]
async fn test_invalid_pattern_rejected_at_load() {
    let mut definition = address_form();
    definition.fields[1].validation = Some(formtitan_core::ValidationSpec::new().pattern("(unclosed"));
    let engine = FormEngine::new(MockTransport::new(), quiet_options());

    match engine.load_form(definition).await {
        LoadOutcome::Failed(FormError::InvalidPattern { field, .. }) => assert_eq!(field, "state"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(engine.status(), FormStatus::LoadError);
}

#[tokio::test(start_paused = true)]
async fn test_latest_load_wins() {
    let mut slow = address_form();
    slow.form_id = "slow".to_string();
    let mut fast = address_form();
    fast.form_id = "fast".to_string();
    let transport = MockTransport::new().with_form(slow, 50).with_form(fast, 10);
    let engine = FormEngine::new(transport, quiet_options());

    let (first, second) = tokio::join!(engine.load_form("slow"), engine.load_form("fast"));

    assert_eq!(first, LoadOutcome::Superseded);
    assert_eq!(second, LoadOutcome::Loaded { form_id: "fast".to_string() });
    assert_eq!(engine.definition().unwrap().form_id, "fast");
    assert_eq!(engine.status(), FormStatus::Ready);
}

#[tokio::test]
async fn test_defaults_seeded_once_per_field() {
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(address_form()).await;
    assert_eq!(engine.get_field_value("newsletter"), Some(json!(true)));

    engine.set_value("newsletter", json!(false));
    engine.load_form(address_form()).await;
    assert_eq!(engine.get_field_value("newsletter"), Some(json!(false)));

    engine.reset_form();
    assert_eq!(engine.get_form_data(), json!({}));
    engine.load_form(address_form()).await;
    assert_eq!(engine.get_field_value("newsletter"), None);
}

// ============================================================================
// Editing
// ============================================================================

#[tokio::test]
async fn test_visibility_toggles_with_country() {
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(address_form()).await;
    let events = record(&engine);

    assert!(!engine.is_field_visible("state"));

    engine.set_value("country", json!("US"));
    assert!(engine.is_field_visible("state"));
    assert_eq!(
        engine.visible_tree().unwrap().field_ids(),
        vec!["country", "state", "newsletter"]
    );

    engine.set_value("state", json!("NY"));
    engine.set_value("country", json!("CA"));
    assert!(!engine.is_field_visible("state"));
    assert_eq!(engine.visible_tree().unwrap().field_ids(), vec!["country", "newsletter"]);
    assert_eq!(engine.get_field_value("state"), Some(json!("NY")));

    let flips: Vec<FormEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::VisibilityChange)
        .cloned()
        .collect();
    assert_eq!(
        flips,
        vec![
            FormEvent::VisibilityChange { field_id: "state".to_string(), visible: true },
            FormEvent::VisibilityChange { field_id: "state".to_string(), visible: false },
        ]
    );
}

#[tokio::test]
async fn test_change_event_precedes_visibility_and_validation() {
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(contact_form()).await;
    let events = record(&engine);

    engine.set_value("email", json!("bob"));

    let kinds: Vec<EventKind> = events.lock().unwrap().iter().map(FormEvent::kind).collect();
    assert_eq!(kinds, vec![EventKind::FieldChange, EventKind::ErrorChange]);
    assert_eq!(engine.get_error("email").as_deref(), Some("Invalid format"));
}

#[tokio::test]
async fn test_validate_on_change_disabled() {
    let options = quiet_options().with_validate_on_change(false);
    let engine = FormEngine::new(MockTransport::new(), options);
    engine.load_form(contact_form()).await;

    engine.set_value("first_name", json!("A"));
    assert!(engine.errors().is_empty());

    engine.blur_field("first_name");
    assert_eq!(engine.get_error("first_name").as_deref(), Some("Must be at least 2 characters"));
}

#[tokio::test]
async fn test_set_form_data_and_lookup() {
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(address_form()).await;

    let data = json!({ "country": "US", "state": "WA" });
    engine.set_form_data(data.as_object().unwrap().clone());

    assert!(engine.is_field_visible("state"));
    assert_eq!(engine.get_field("state").unwrap().label, "State");
    assert!(engine.get_field("ghost").is_none());
    assert_eq!(
        engine.get_form_data(),
        json!({ "country": "US", "state": "WA", "newsletter": true })
    );
}

#[tokio::test]
async fn test_render_uses_registered_kind() {
    let mut definition = address_form();
    definition.fields[0].field_type = "map".into();

    let renderer = OutlineRenderer::new();
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(definition).await;
    let mut engine = engine.with_renderer(renderer.clone());
    assert!(renderer.outline().contains("?? Unknown field type: map"));

    engine.register_field_kind("map", Widget::Custom { name: "map".to_string() });
    engine.render();
    assert!(!renderer.outline().contains("??"));
    assert_eq!(renderer.render_count(), 2);
}

#[tokio::test]
async fn test_subscriber_can_call_back_into_engine() {
    let engine = Arc::new(FormEngine::new(MockTransport::new(), quiet_options()));
    engine.load_form(address_form()).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (handle, sink) = (Arc::clone(&engine), Arc::clone(&seen));
    engine.on(EventKind::FieldChange, move |_| {
        sink.lock().unwrap().push(handle.get_form_data());
    });

    engine.set_value("country", json!("CA"));
    assert_eq!(seen.lock().unwrap()[0]["country"], json!("CA"));
}

#[tokio::test]
async fn test_custom_validator_registration() {
    let mut definition = address_form();
    definition.fields[1].validation = Some(
        formtitan_core::ValidationSpec::new()
            .custom("uppercase", json!({ "message": "Use capitals" })),
    );

    let mut engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.register_validator("uppercase", |value, options, _data| {
        let text = value?.as_str()?;
        if text.chars().all(|c| c.is_ascii_uppercase()) {
            None
        } else {
            options["message"].as_str().map(str::to_string)
        }
    });
    engine.load_form(definition).await;

    engine.set_value("state", json!("ny"));
    assert_eq!(engine.get_error("state").as_deref(), Some("Use capitals"));
    engine.set_value("state", json!("NY"));
    assert_eq!(engine.get_error("state"), None);
}

// ============================================================================
// Submitting
// ============================================================================

#[tokio::test]
async fn test_invalid_submit_never_calls_transport() {
    let transport = MockTransport::new();
    let calls = Arc::clone(&transport.submit_calls);
    let engine = FormEngine::new(transport, quiet_options());
    engine.load_form(contact_form()).await;
    engine.set_value("first_name", json!("Ada"));
    engine.set_value("last_name", json!("Lovelace"));
    engine.set_value("email", json!("ada@example.com"));
    engine.set_value("contact_method", json!("phone"));
    let events = record(&engine);

    let outcome = engine.handle_submit().await;

    let expected = BTreeMap::from([("message".to_string(), "This field is required".to_string())]);
    assert_eq!(outcome, SubmitOutcome::Invalid(expected.clone()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.errors(), expected);
    assert_eq!(engine.status(), FormStatus::Ready);
    assert_eq!(engine.current_message().unwrap().text, "Please fix the errors above");

    let failures: Vec<FormEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::ValidationFailed)
        .cloned()
        .collect();
    assert_eq!(failures, vec![FormEvent::ValidationFailed { errors: expected }]);
}

#[tokio::test]
async fn test_successful_submit() {
    let transport = MockTransport::new();
    let payloads = Arc::clone(&transport.payloads);
    let engine = FormEngine::new(transport, quiet_options());
    engine.load_form(contact_form()).await;
    fill_contact(&engine);
    let events = record(&engine);

    let outcome = engine.handle_submit().await;

    assert!(matches!(outcome, SubmitOutcome::Submitted(ref r) if r.message == "Thanks! We'll be in touch."));
    assert_eq!(engine.status(), FormStatus::Submitted);
    assert_eq!(payloads.lock().unwrap()[0]["email"], json!("ada@example.com"));
    assert_eq!(engine.get_field_value("first_name"), Some(json!("Ada")));

    let message = engine.current_message().unwrap();
    assert_eq!(message.text, "Thanks! We'll be in touch.");
    assert_eq!(message.kind, MessageKind::Success);

    let submitted = events
        .lock()
        .unwrap()
        .iter()
        .find_map(|e| match e {
            FormEvent::FormSubmitted { data, result } => Some((data.clone(), result.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(submitted.0["last_name"], json!("Lovelace"));
    assert_eq!(submitted.1["message"], json!("Thanks! We'll be in touch."));
}

#[tokio::test]
async fn test_reset_on_submit() {
    let options = quiet_options().with_reset_on_submit(true);
    let engine = FormEngine::new(MockTransport::new(), options);
    engine.load_form(contact_form()).await;
    fill_contact(&engine);
    let events = record(&engine);

    engine.handle_submit().await;

    assert_eq!(engine.get_form_data(), json!({}));
    assert!(engine.errors().is_empty());
    assert!(events.lock().unwrap().contains(&FormEvent::FormReset));
}

#[tokio::test]
async fn test_failed_submit_keeps_data() {
    let transport = MockTransport::new()
        .failing_submit(TransportError::status(500, Some("Database unavailable".to_string())));
    let engine = FormEngine::new(transport, quiet_options());
    engine.load_form(contact_form()).await;
    fill_contact(&engine);
    let events = record(&engine);

    let outcome = engine.handle_submit().await;

    assert_eq!(outcome, SubmitOutcome::Failed("Database unavailable".to_string()));
    assert_eq!(engine.status(), FormStatus::SubmitError);
    assert_eq!(engine.get_field_value("email"), Some(json!("ada@example.com")));
    assert_eq!(engine.current_message().unwrap().kind, MessageKind::Error);
    assert!(events.lock().unwrap().contains(&FormEvent::Error {
        message: "Failed to submit form".to_string(),
        detail: "Database unavailable".to_string(),
    }));

    // still accepts a retry
    assert!(!engine.is_submitting());
    assert!(matches!(engine.handle_submit().await, SubmitOutcome::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submit_runs_once() {
    let transport = MockTransport::new().with_submit_delay(50);
    let calls = Arc::clone(&transport.submit_calls);
    let engine = FormEngine::new(transport, quiet_options());
    engine.load_form(contact_form()).await;
    fill_contact(&engine);

    let (first, second) = tokio::join!(engine.handle_submit(), engine.handle_submit());

    assert!(matches!(first, SubmitOutcome::Submitted(_)));
    assert_eq!(second, SubmitOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!engine.is_submitting());
}

#[tokio::test]
async fn test_validation_scope() {
    // `state` is required but hidden until country is US
    let engine = FormEngine::new(MockTransport::new(), quiet_options());
    engine.load_form(address_form()).await;
    engine.set_value("country", json!("CA"));
    assert!(!engine.validate());
    assert!(engine.errors().contains_key("state"));

    let options = quiet_options().with_validation_scope(ValidationScope::VisibleOnly);
    let engine = FormEngine::new(MockTransport::new(), options);
    engine.load_form(address_form()).await;
    engine.set_value("country", json!("CA"));
    assert!(engine.validate());
    assert!(matches!(engine.handle_submit().await, SubmitOutcome::Submitted(_)));
}

// ============================================================================
// Status messages
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_older_timer_never_clears_newer_message() {
    let renderer = OutlineRenderer::new();
    let engine = FormEngine::new(MockTransport::new(), quiet_options()).with_renderer(renderer.clone());
    engine.load_form(contact_form()).await;
    let events = record(&engine);

    engine.handle_submit().await;
    let first = engine.current_message().unwrap();

    tokio::time::sleep(Duration::from_millis(3000)).await;
    engine.handle_submit().await;
    let second = engine.current_message().unwrap();
    assert_ne!(first.id, second.id);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(engine.current_message().map(|m| m.id), Some(second.id));
    assert_eq!(renderer.message().map(|m| m.id), Some(second.id));

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(engine.current_message().is_none());
    assert!(renderer.message().is_none());

    let expired: Vec<FormEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::MessageExpired)
        .cloned()
        .collect();
    assert_eq!(expired, vec![FormEvent::MessageExpired { id: second.id }]);
}
