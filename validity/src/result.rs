//! Result snapshots: per-validator verdicts, errors and flags.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::executor::ValidationOutcome;
use crate::interaction::InteractionFlags;

/// The seven state flags of a field or group.
///
/// Only the four primary flags are stored; `invalid`, `pristine` and
/// `untouched` are always their negations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub valid: bool,
    pub dirty: bool,
    pub touched: bool,
    pub modified: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            valid: true,
            dirty: false,
            touched: false,
            modified: false,
        }
    }
}

impl Flags {
    /// Combine a validity verdict with interaction flags.
    pub fn new(valid: bool, interaction: InteractionFlags) -> Self {
        Self {
            valid,
            dirty: interaction.dirty,
            touched: interaction.touched,
            modified: interaction.modified,
        }
    }

    pub fn invalid(&self) -> bool {
        !self.valid
    }

    pub fn pristine(&self) -> bool {
        !self.dirty
    }

    pub fn untouched(&self) -> bool {
        !self.touched
    }

    pub(crate) fn serialize_into<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("valid", &self.valid)?;
        map.serialize_entry("invalid", &self.invalid())?;
        map.serialize_entry("dirty", &self.dirty)?;
        map.serialize_entry("pristine", &self.pristine())?;
        map.serialize_entry("touched", &self.touched)?;
        map.serialize_entry("untouched", &self.untouched())?;
        map.serialize_entry("modified", &self.modified)
    }
}

/// Verdict of one validator as exposed in a result.
///
/// Serializes to `false` when passed (or not run), the message when failed
/// with one, and `true` when failed without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorResult {
    Passed,
    Failed(Option<String>),
}

impl ValidatorResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed(Some(message)) => Some(message),
            _ => None,
        }
    }
}

impl From<&ValidationOutcome> for ValidatorResult {
    fn from(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Failed(message) => Self::Failed(message.clone()),
            _ => Self::Passed,
        }
    }
}

impl Serialize for ValidatorResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Passed => serializer.serialize_bool(false),
            Self::Failed(None) => serializer.serialize_bool(true),
            Self::Failed(Some(message)) => serializer.serialize_str(message),
        }
    }
}

/// A failed validator on a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub validator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.field, message),
            None => write!(f, "{}: failed '{}'", self.field, self.validator),
        }
    }
}

/// Snapshot of a field's validation state.
///
/// Validator keys keep declaration order, and `errors` is `None` rather than
/// empty when nothing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    field: String,
    validators: IndexMap<String, ValidatorResult>,
    errors: Option<Vec<ValidationError>>,
    flags: Flags,
}

impl ValidationResult {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get a validator's verdict.
    pub fn get(&self, validator: &str) -> Option<&ValidatorResult> {
        self.validators.get(validator)
    }

    /// Iterate verdicts in declaration order.
    pub fn validators(&self) -> impl Iterator<Item = (&str, &ValidatorResult)> {
        self.validators.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Failed validators in declaration order, or `None` when nothing failed.
    pub fn errors(&self) -> Option<&[ValidationError]> {
        self.errors.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn valid(&self) -> bool {
        self.flags.valid
    }

    pub fn invalid(&self) -> bool {
        self.flags.invalid()
    }

    pub fn dirty(&self) -> bool {
        self.flags.dirty
    }

    pub fn pristine(&self) -> bool {
        self.flags.pristine()
    }

    pub fn touched(&self) -> bool {
        self.flags.touched
    }

    pub fn untouched(&self) -> bool {
        self.flags.untouched()
    }

    pub fn modified(&self) -> bool {
        self.flags.modified
    }

    /// Convert to the flat JSON shape.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, verdict) in &self.validators {
            map.serialize_entry(name, verdict)?;
        }
        if let Some(errors) = &self.errors {
            map.serialize_entry("errors", errors)?;
        }
        self.flags.serialize_into(&mut map)?;
        map.end()
    }
}

/// Build a result from committed outcomes and interaction flags.
///
/// The field is valid unless some outcome failed, so a never-run field is
/// valid and a settled run is valid exactly when every validator passed.
pub fn build_result(
    field: &str,
    outcomes: &[(String, ValidationOutcome)],
    interaction: InteractionFlags,
) -> ValidationResult {
    let validators: IndexMap<String, ValidatorResult> = outcomes
        .iter()
        .map(|(name, outcome)| (name.clone(), ValidatorResult::from(outcome)))
        .collect();

    let errors: Vec<ValidationError> = outcomes
        .iter()
        .filter_map(|(name, outcome)| match outcome {
            ValidationOutcome::Failed(message) => Some(ValidationError {
                field: field.to_string(),
                validator: name.clone(),
                message: message.clone(),
            }),
            _ => None,
        })
        .collect();

    let flags = Flags::new(errors.is_empty(), interaction);

    ValidationResult {
        field: field.to_string(),
        validators,
        errors: (!errors.is_empty()).then_some(errors),
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcomes(list: &[(&str, ValidationOutcome)]) -> Vec<(String, ValidationOutcome)> {
        list.iter()
            .map(|(name, outcome)| (name.to_string(), outcome.clone()))
            .collect()
    }

    #[test]
    fn test_flag_negations() {
        let flags = Flags::default();
        assert!(flags.valid && !flags.invalid());
        assert!(flags.pristine() && flags.untouched());
    }

    #[test]
    fn test_all_passed() {
        let result = build_result(
            "field1",
            &outcomes(&[
                ("pattern", ValidationOutcome::Passed),
                ("maxlength", ValidationOutcome::Passed),
            ]),
            InteractionFlags::default(),
        );
        assert!(result.valid());
        assert!(result.errors().is_none());
        assert_eq!(result.get("pattern"), Some(&ValidatorResult::Passed));
    }

    #[test]
    fn test_errors_keep_declaration_order() {
        let result = build_result(
            "field1",
            &outcomes(&[
                ("required", ValidationOutcome::Failed(None)),
                ("numeric", ValidationOutcome::Failed(Some("invalid field1 value".into()))),
            ]),
            InteractionFlags::default(),
        );
        assert!(result.invalid());
        let errors = result.errors().unwrap();
        assert_eq!(errors[0].validator, "required");
        assert_eq!(errors[0].message, None);
        assert_eq!(errors[1].validator, "numeric");
        assert_eq!(errors[1].message.as_deref(), Some("invalid field1 value"));
    }

    #[test]
    fn test_not_run_counts_as_valid() {
        let result = build_result(
            "field1",
            &outcomes(&[("required", ValidationOutcome::NotRun)]),
            InteractionFlags::default(),
        );
        assert!(result.valid());
        assert_eq!(result.get("required"), Some(&ValidatorResult::Passed));
    }

    #[test]
    fn test_serializes_flat_shape() {
        let result = build_result(
            "field1",
            &outcomes(&[
                ("required", ValidationOutcome::Failed(None)),
                ("maxlength", ValidationOutcome::Failed(Some("too long !!".into()))),
                ("pattern", ValidationOutcome::Passed),
            ]),
            InteractionFlags {
                dirty: true,
                touched: false,
                modified: true,
            },
        );

        assert_eq!(
            result.to_json(),
            json!({
                "required": true,
                "maxlength": "too long !!",
                "pattern": false,
                "errors": [
                    { "field": "field1", "validator": "required" },
                    { "field": "field1", "validator": "maxlength", "message": "too long !!" }
                ],
                "valid": false,
                "invalid": true,
                "dirty": true,
                "pristine": false,
                "touched": false,
                "untouched": true,
                "modified": true
            })
        );
    }

    #[test]
    fn test_no_errors_key_when_valid() {
        let result = build_result("f", &[], InteractionFlags::default());
        let json = result.to_json();
        assert!(json.get("errors").is_none());
        assert_eq!(json["valid"], json!(true));
    }

    #[test]
    fn test_json_keeps_declaration_order() {
        let result = build_result(
            "field1",
            &outcomes(&[
                ("required", ValidationOutcome::Passed),
                ("pattern", ValidationOutcome::Failed(None)),
                ("maxlength", ValidationOutcome::Failed(None)),
            ]),
            InteractionFlags::default(),
        );

        let json = result.to_json();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "required", "pattern", "maxlength", "errors", "valid", "invalid", "dirty",
                "pristine", "touched", "untouched", "modified",
            ]
        );
    }
}
