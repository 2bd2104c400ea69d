//! Runs a single validator and normalizes whatever it returned.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use log::debug;
use serde_json::Value;

use crate::error::{ExecutionError, extract_panic_message};
use crate::registry::{BoxFuture, CheckReturn, ValidatorSpec};

/// State of one validator within one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Never run since creation or the last reset.
    #[default]
    NotRun,
    /// Started and not yet settled.
    Running,
    /// Settled successfully.
    Passed,
    /// Settled with a failure, with the rendered message if there is one.
    Failed(Option<String>),
}

impl ValidationOutcome {
    /// Check if the validator settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed(_))
    }

    /// Check if the validator failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of starting a validator.
pub enum Execution {
    /// The check returned synchronously.
    Settled(ValidationOutcome),
    /// The check returned a future; awaiting it always yields a settled outcome.
    Pending(BoxFuture<'static, ValidationOutcome>),
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled(outcome) => f.debug_tuple("Settled").field(outcome).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Start a validator against a value.
///
/// Errors and panics from the check are contained here and become a failure
/// of this validator only.
pub fn execute(spec: &ValidatorSpec, field: &str, value: &Value) -> Execution {
    let returned = panic::catch_unwind(AssertUnwindSafe(|| (spec.check)(value, &spec.rule)))
        .unwrap_or_else(|panic| Err(ExecutionError::new(extract_panic_message(&panic))));

    match returned {
        Ok(CheckReturn::Ready(value)) => Execution::Settled(judge(&value, spec, field)),
        Ok(CheckReturn::Pending(fut)) => {
            let spec = spec.clone();
            let field = field.to_string();
            Execution::Pending(Box::pin(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(value)) => judge(&value, &spec, &field),
                    Ok(Err(rejection)) => {
                        debug!(
                            "Validator '{}' on '{}' rejected: {:?}",
                            spec.name, field, rejection.reason
                        );
                        ValidationOutcome::Failed(spec.message_for(&field))
                    }
                    Err(panic) => {
                        let err = ExecutionError::new(extract_panic_message(&panic));
                        contained(&spec, &field, err)
                    }
                }
            }))
        }
        Err(err) => Execution::Settled(contained(spec, field, err)),
    }
}

/// Only an explicit `false` fails; strings, `null` and everything else pass.
fn judge(value: &Value, spec: &ValidatorSpec, field: &str) -> ValidationOutcome {
    match value {
        Value::Bool(false) => ValidationOutcome::Failed(spec.message_for(field)),
        _ => ValidationOutcome::Passed,
    }
}

fn contained(spec: &ValidatorSpec, field: &str, err: ExecutionError) -> ValidationOutcome {
    debug!("Validator '{}' on '{}' errored: {}", spec.name, field, err);
    ValidationOutcome::Failed(Some(spec.message_for(field).unwrap_or(err.message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::registry::{MessageSource, ValidatorDefinition};
    use serde_json::json;

    fn spec(definition: ValidatorDefinition) -> ValidatorSpec {
        ValidatorSpec {
            name: "check".to_string(),
            check: definition.check().clone(),
            rule: Value::Null,
            message: definition.message().cloned(),
        }
    }

    fn settled(execution: Execution) -> ValidationOutcome {
        match execution {
            Execution::Settled(outcome) => outcome,
            Execution::Pending(_) => panic!("expected a settled execution"),
        }
    }

    #[test]
    fn test_bool_returns() {
        let pass = spec(ValidatorDefinition::sync(|_, _| true));
        assert_eq!(settled(execute(&pass, "f", &json!(""))), ValidationOutcome::Passed);

        let fail = spec(ValidatorDefinition::sync(|_, _| false));
        assert_eq!(settled(execute(&fail, "f", &json!(""))), ValidationOutcome::Failed(None));
    }

    #[test]
    fn test_string_return_passes() {
        let def = spec(ValidatorDefinition::sync(|_, _| "looks wrong"));
        assert_eq!(settled(execute(&def, "f", &json!(""))), ValidationOutcome::Passed);
    }

    #[test]
    fn test_failure_message_resolution() {
        let text = spec(ValidatorDefinition::sync(|_, _| false).with_message("bad"));
        assert_eq!(
            settled(execute(&text, "f", &json!(""))),
            ValidationOutcome::Failed(Some("bad".to_string()))
        );

        let format = spec(
            ValidatorDefinition::sync(|_, _| false)
                .with_message(MessageSource::format(|field, _| format!("invalid {field} value"))),
        );
        assert_eq!(
            settled(execute(&format, "field1", &json!(""))),
            ValidationOutcome::Failed(Some("invalid field1 value".to_string()))
        );
    }

    #[test]
    fn test_error_is_contained() {
        let def = spec(ValidatorDefinition::new(|_, _| Err(ExecutionError::new("lookup failed"))));
        assert_eq!(
            settled(execute(&def, "f", &json!(""))),
            ValidationOutcome::Failed(Some("lookup failed".to_string()))
        );
    }

    #[test]
    fn test_panic_is_contained() {
        let def = spec(ValidatorDefinition::sync(|_, _| -> bool { panic!("boom") }));
        assert_eq!(
            settled(execute(&def, "f", &json!(""))),
            ValidationOutcome::Failed(Some("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_async_resolution() {
        let def = spec(ValidatorDefinition::future(|value, _| async move {
            if value == "dio" { Ok(()) } else { Err(Rejection::new()) }
        }));

        let Execution::Pending(fut) = execute(&def, "f", &json!("dio")) else {
            panic!("expected a pending execution");
        };
        assert_eq!(fut.await, ValidationOutcome::Passed);

        let Execution::Pending(fut) = execute(&def, "f", &json!("")) else {
            panic!("expected a pending execution");
        };
        assert_eq!(fut.await, ValidationOutcome::Failed(None));
    }

    #[tokio::test]
    async fn test_async_false_fails_with_message() {
        let def = spec(
            ValidatorDefinition::future(|_, _| async { Ok::<_, Rejection>(false) })
                .with_message("taken"),
        );
        let Execution::Pending(fut) = execute(&def, "f", &json!("x")) else {
            panic!("expected a pending execution");
        };
        assert_eq!(fut.await, ValidationOutcome::Failed(Some("taken".to_string())));
    }

    #[tokio::test]
    async fn test_async_rejection_reason_not_surfaced() {
        let def = spec(ValidatorDefinition::future(|_, _| async {
            Err::<(), _>(Rejection::with_reason("network down"))
        }));
        let Execution::Pending(fut) = execute(&def, "f", &json!("x")) else {
            panic!("expected a pending execution");
        };
        assert_eq!(fut.await, ValidationOutcome::Failed(None));
    }
}
