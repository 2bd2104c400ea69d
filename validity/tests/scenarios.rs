//! End-to-end field scenarios: built-in validators, async validators,
//! staleness, interaction flags and notifications.

use std::collections::VecDeque;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use validity::prelude::*;

fn context() -> ValidationContext {
    ValidationContext::new(ValidityConfig::new().into_shared())
}

fn exist() -> ValidatorDefinition {
    ValidatorDefinition::future(|value, _| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if value == "dio" {
            Ok(true)
        } else {
            Err(Rejection::with_reason("no such user"))
        }
    })
}

fn record(field: &Validity) -> Arc<Mutex<Vec<ValidityEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    field.subscribe(move |event| sink.lock().unwrap().push(*event));
    events
}

fn count(events: &Mutex<Vec<ValidityEvent>>, matches: impl Fn(&ValidityEvent) -> bool) -> usize {
    events.lock().unwrap().iter().filter(|e| matches(e)).count()
}

// =============================================================================
// Built-in validators
// =============================================================================

#[test]
fn test_required_scenario() {
    let field = context()
        .field("field1", "", ValidatorRef::rules().with("required", true))
        .unwrap();

    assert!(!field.validate().settled().unwrap());
    let result = field.result();
    assert_eq!(result.to_json()["required"], json!(true));
    assert!(!result.valid());

    field.value_changed("hello");
    assert!(field.validate().settled().unwrap());
    let result = field.result();
    assert_eq!(result.to_json()["required"], json!(false));
    assert!(result.valid());
    assert!(result.errors().is_none());
    assert!(result.to_json().get("errors").is_none());
}

#[test]
fn test_pattern_and_maxlength_scenario() {
    let field = context()
        .field(
            "field1",
            "hello",
            ValidatorRef::rules()
                .with("pattern", "/^[0-9]+$/")
                .with("maxlength", 4),
        )
        .unwrap();

    field.validate();
    let json = field.result().to_json();
    assert_eq!(
        json["errors"],
        json!([
            {"field": "field1", "validator": "pattern"},
            {"field": "field1", "validator": "maxlength"},
        ])
    );
    assert_eq!(json["invalid"], json!(true));

    field.value_changed("123");
    field.validate();
    let result = field.result();
    assert!(result.valid());
    assert!(result.errors().is_none());
}

#[test]
fn test_zero_validators_are_valid() {
    let field = context().field("field1", "x", ValidatorRef::default()).unwrap();
    assert_eq!(field.validate().settled(), Some(true));
    assert!(field.result().valid());
    assert!(field.progresses().is_empty());
}

// =============================================================================
// Custom validators and messages
// =============================================================================

#[test]
fn test_custom_validator_with_formatted_message() {
    let numeric = ValidatorDefinition::sync(|value, _| {
        value.as_str().is_some_and(|text| text.parse::<f64>().is_ok())
    })
    .with_message(MessageSource::format(|field, _| format!("invalid {field} value")));
    let cx = context().with_validator("numeric", numeric);

    let field = cx.field("field1", "abc", "numeric").unwrap();
    field.validate();

    let result = field.result();
    assert_eq!(
        result.get("numeric"),
        Some(&ValidatorResult::Failed(Some("invalid field1 value".to_string())))
    );
    assert_eq!(result.to_json()["numeric"], json!("invalid field1 value"));
    assert_eq!(
        result.errors().unwrap()[0].message.as_deref(),
        Some("invalid field1 value")
    );

    field.value_changed("42");
    field.validate();
    assert!(field.valid());
}

#[test]
fn test_rule_message_override() {
    let reference = ValidatorRef::from_json(
        r#"{"required": true, "maxlength": {"rule": 4, "message": "too long"}}"#,
    )
    .unwrap();
    let field = context().field("field1", "hello", reference).unwrap();
    field.validate();

    let result = field.result();
    assert_eq!(result.get("required"), Some(&ValidatorResult::Passed));
    assert_eq!(result.to_json()["maxlength"], json!("too long"));
}

#[test]
fn test_string_return_means_passed() {
    let cx = context().with_validator("loose", ValidatorDefinition::sync(|_, _| "not a failure"));
    let field = cx.field("field1", "", "loose").unwrap();
    assert_eq!(field.validate().settled(), Some(true));
}

#[test]
fn test_erroring_validator_is_contained() {
    let cx = context().with_validator(
        "broken",
        ValidatorDefinition::new(|_, _| Err(ExecutionError::new("lookup table missing"))),
    );
    let field = cx
        .field(
            "field1",
            "hello",
            ValidatorRef::rules().with("broken", true).with("required", true),
        )
        .unwrap();

    field.validate();
    let result = field.result();
    assert_eq!(
        result.get("broken"),
        Some(&ValidatorResult::Failed(Some("lookup table missing".to_string())))
    );
    assert_eq!(result.get("required"), Some(&ValidatorResult::Passed));
    assert!(result.invalid());
}

#[test]
fn test_unknown_validator_is_a_setup_error() {
    let err = context().field("field1", "", "nope").unwrap_err();
    assert_eq!(err.to_string(), "Unknown validator 'nope'");
}

// =============================================================================
// Async validators
// =============================================================================

#[tokio::test]
async fn test_async_exist_scenario() {
    let field = context()
        .with_validator("exist", exist())
        .field("field1", "", "exist")
        .unwrap();

    let validation = field.validate();
    assert!(validation.is_pending());
    assert_eq!(field.progresses().get("exist"), Some(Progress::Running));
    assert!(field.is_validating());

    assert!(!validation.await);
    let result = field.result();
    assert_eq!(result.to_json()["exist"], json!(true));
    assert!(result.invalid());
    assert_eq!(field.progresses().get("exist"), Some(Progress::Idle));

    field.value_changed("dio");
    assert!(field.validate().await);
    let result = field.result();
    assert_eq!(result.to_json()["exist"], json!(false));
    assert!(result.valid());
}

#[tokio::test]
async fn test_newer_run_wins() {
    let gates = Arc::new(Mutex::new(VecDeque::new()));
    let (first_tx, first_rx) = oneshot::channel::<bool>();
    let (second_tx, second_rx) = oneshot::channel::<bool>();
    gates.lock().unwrap().extend([first_rx, second_rx]);

    let source = Arc::clone(&gates);
    let gate = ValidatorDefinition::future(move |_, _| {
        let rx = source.lock().unwrap().pop_front();
        async move {
            match rx {
                Some(rx) => Ok(rx.await.unwrap_or(false)),
                None => Err(Rejection::new()),
            }
        }
    });
    let field = context()
        .with_validator("gate", gate)
        .field("field1", "", "gate")
        .unwrap();

    let first = tokio::spawn(field.validate().into_future());
    let second = tokio::spawn(field.validate().into_future());

    second_tx.send(true).unwrap();
    assert!(second.await.unwrap());

    first_tx.send(false).unwrap();
    first.await.unwrap();

    assert!(field.valid());
    assert_eq!(field.result().get("gate"), Some(&ValidatorResult::Passed));
    assert!(!field.progresses().is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_validators_run_together() {
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let release = Arc::new(Mutex::new(Some(release_rx)));
    let slow = ValidatorDefinition::future(move |_, _| {
        let rx = release.lock().unwrap().take();
        async move {
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok::<_, Rejection>(true)
        }
    });
    let fast = ValidatorDefinition::future(|_, _| async { Ok::<_, Rejection>(true) });

    // Declared slow first: fast can only settle meanwhile if both are driven at once.
    let field = context()
        .with_validator("slow", slow)
        .with_validator("fast", fast)
        .field("field1", "", vec!["slow", "fast"])
        .unwrap();

    let validation = tokio::spawn(field.validate().into_future());

    tokio::time::timeout(Duration::from_secs(5), async {
        while field.progresses().get("fast") != Some(Progress::Idle) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(field.progresses().get("slow"), Some(Progress::Running));
    assert!(field.is_validating());

    release_tx.send(()).unwrap();
    assert!(validation.await.unwrap());
    assert!(!field.progresses().is_running());
}

#[tokio::test]
async fn test_reset_discards_in_flight_run() {
    let field = context()
        .with_validator("exist", exist())
        .field("field1", "", "exist")
        .unwrap();

    let validation = field.validate();
    field.reset();
    validation.await;

    let result = field.result();
    assert!(result.valid());
    assert_eq!(result.get("exist"), Some(&ValidatorResult::Passed));
    assert!(!field.is_validated());
}

// =============================================================================
// Interaction state and notifications
// =============================================================================

#[test]
fn test_dirty_and_touched_are_sticky() {
    let field = context().field("field1", "", "required").unwrap();

    field.value_changed("a");
    field.value_changed("");
    assert!(field.dirty());
    assert!(!field.modified());

    field.blurred();
    field.value_changed("b");
    assert!(field.touched());
    assert!(field.modified());
}

#[test]
fn test_reset_is_idempotent() {
    let field = context().field("field1", "init", "required").unwrap();
    let created = field.result();

    field.value_changed("");
    field.blurred();
    field.validate();
    assert!(field.invalid());

    field.reset();
    let once = (field.result(), field.progresses(), field.value());
    field.reset();
    let twice = (field.result(), field.progresses(), field.value());

    assert_eq!(once, twice);
    assert_eq!(once.0, created);
    assert_eq!(once.2, json!("init"));
    assert!(field.pristine() && field.untouched() && !field.modified());
}

#[test]
fn test_event_counts() {
    let field = context().field("field1", "", "required").unwrap();
    let events = record(&field);

    field.value_changed("a");
    assert_eq!(count(&events, |e| *e == ValidityEvent::Dirty), 1);
    assert_eq!(count(&events, |e| matches!(e, ValidityEvent::Modified(_))), 1);

    field.blurred();
    field.validate();
    assert_eq!(count(&events, |e| *e == ValidityEvent::Touched), 1);
    assert_eq!(count(&events, |e| *e == ValidityEvent::Valid), 1);

    field.value_changed("");
    assert_eq!(count(&events, |e| matches!(e, ValidityEvent::Modified(_))), 2);
    assert_eq!(count(&events, |e| *e == ValidityEvent::Dirty), 1);

    field.blurred();
    field.validate();
    assert_eq!(count(&events, |e| *e == ValidityEvent::Touched), 1);
    assert_eq!(count(&events, |e| *e == ValidityEvent::Invalid), 1);
}

#[test]
fn test_unsubscribe_stops_events() {
    let field = context().field("field1", "", "required").unwrap();
    let events = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&events);
    let id = field.subscribe(move |_| *sink.lock().unwrap() += 1);

    field.value_changed("a");
    let seen = *events.lock().unwrap();
    assert!(seen > 0);

    assert!(field.unsubscribe(id));
    field.value_changed("b");
    assert_eq!(*events.lock().unwrap(), seen);
}

#[test]
fn test_classes_before_and_after_validation() {
    let classes = ClassOverrides::from_json(r#"{"invalid": "has-error"}"#).unwrap();
    let field = context()
        .with_classes(classes)
        .field("field1", "", "required")
        .unwrap();

    assert_eq!(field.classes(), vec!["untouched", "pristine"]);

    field.value_changed("x");
    field.blurred();
    assert_eq!(field.classes(), vec!["touched", "dirty", "modified"]);

    field.value_changed("");
    field.validate();
    assert_eq!(field.classes(), vec!["touched", "dirty", "has-error"]);

    field.reset();
    assert_eq!(field.classes(), vec!["untouched", "pristine"]);
}
