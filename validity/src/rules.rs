//! Validator references: the shapes a field's validator set can be written in.
//!
//! A reference is resolved once, when the field is configured, into an
//! ordered list of [`ValidatorSpec`]s. Runs never look at the reference again.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ConfigError;
use crate::registry::{MessageSource, ValidatorDefinition, ValidatorRegistry, ValidatorSpec, lookup};

/// The rule attached to one validator name.
#[derive(Debug, Clone)]
pub enum RuleSpec {
    /// `true`: run with the default argument.
    Default,
    /// Any other value, passed to the check as its argument.
    Arg(Value),
    /// `{rule, message}`: argument plus a message overriding the definition's.
    Detailed {
        rule: Value,
        message: Option<MessageSource>,
    },
    /// A definition given in place; no registry lookup.
    Inline(ValidatorDefinition),
}

impl RuleSpec {
    /// Create a rule with a local message override.
    pub fn with_message(rule: impl Into<Value>, message: impl Into<MessageSource>) -> Self {
        Self::Detailed {
            rule: rule.into(),
            message: Some(message.into()),
        }
    }

    /// Interpret a JSON rule value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Bool(true) => Ok(Self::Default),
            Value::Object(mut map) if map.contains_key("rule") => {
                let rule = map.remove("rule").unwrap_or(Value::Null);
                let message = match map.remove("message") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(text)) => Some(MessageSource::Text(text)),
                    Some(other) => {
                        return Err(ConfigError::invalid_reference(format!(
                            "message must be a string, got {other}"
                        )));
                    }
                };
                Ok(Self::Detailed { rule, message })
            }
            other => Ok(Self::Arg(other)),
        }
    }
}

impl From<bool> for RuleSpec {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Default
        } else {
            Self::Arg(Value::Bool(false))
        }
    }
}

impl From<i32> for RuleSpec {
    fn from(arg: i32) -> Self {
        Self::Arg(Value::from(arg))
    }
}

impl From<i64> for RuleSpec {
    fn from(arg: i64) -> Self {
        Self::Arg(Value::from(arg))
    }
}

impl From<&str> for RuleSpec {
    fn from(arg: &str) -> Self {
        Self::Arg(Value::from(arg))
    }
}

impl From<ValidatorDefinition> for RuleSpec {
    fn from(definition: ValidatorDefinition) -> Self {
        Self::Inline(definition)
    }
}

/// A field's validator set, as configured.
///
/// Deserializes from the three JSON shapes:
///
/// ```ignore
/// "required"
/// ["required", "numeric"]
/// { "required": true, "maxlength": { "rule": 4, "message": "too long !!" } }
/// ```
#[derive(Debug, Clone)]
pub enum ValidatorRef {
    /// A single validator name.
    Name(String),
    /// Validator names in declaration order.
    List(Vec<String>),
    /// Validator names with their rules, in declaration order.
    Map(IndexMap<String, RuleSpec>),
}

impl Default for ValidatorRef {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl ValidatorRef {
    /// Create an empty name → rule mapping.
    pub fn rules() -> Self {
        Self::Map(IndexMap::new())
    }

    /// Add a validator with a rule, turning the reference into a mapping.
    pub fn with(self, name: impl Into<String>, rule: impl Into<RuleSpec>) -> Self {
        let mut map = self.into_map();
        map.insert(name.into(), rule.into());
        Self::Map(map)
    }

    /// Parse a reference from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validator names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Name(name) => vec![name.as_str()],
            Self::List(names) => names.iter().map(String::as_str).collect(),
            Self::Map(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Resolve against layered registries, nearest layer first.
    ///
    /// Every name must be found; the first unknown one is reported.
    pub fn resolve(&self, layers: &[&ValidatorRegistry]) -> Result<Vec<ValidatorSpec>, ConfigError> {
        match self {
            Self::Name(name) => Ok(vec![resolve_rule(name, &RuleSpec::Default, layers)?]),
            Self::List(names) => {
                let mut specs: Vec<ValidatorSpec> = Vec::with_capacity(names.len());
                for name in names {
                    if specs.iter().any(|spec| &spec.name == name) {
                        continue;
                    }
                    specs.push(resolve_rule(name, &RuleSpec::Default, layers)?);
                }
                Ok(specs)
            }
            Self::Map(map) => map
                .iter()
                .map(|(name, rule)| resolve_rule(name, rule, layers))
                .collect(),
        }
    }

    fn into_map(self) -> IndexMap<String, RuleSpec> {
        match self {
            Self::Name(name) => IndexMap::from([(name, RuleSpec::Default)]),
            Self::List(names) => names.into_iter().map(|n| (n, RuleSpec::Default)).collect(),
            Self::Map(map) => map,
        }
    }
}

impl From<&str> for ValidatorRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ValidatorRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Vec<&str>> for ValidatorRef {
    fn from(names: Vec<&str>) -> Self {
        Self::List(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ValidatorRef {
    fn from(names: Vec<String>) -> Self {
        Self::List(names)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRef {
    Name(String),
    List(Vec<String>),
    Map(IndexMap<String, Value>),
}

impl<'de> Deserialize<'de> for ValidatorRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawRef::deserialize(deserializer)? {
            RawRef::Name(name) => Ok(Self::Name(name)),
            RawRef::List(names) => Ok(Self::List(names)),
            RawRef::Map(raw) => raw
                .into_iter()
                .map(|(name, value)| Ok((name, RuleSpec::from_value(value)?)))
                .collect::<Result<IndexMap<_, _>, ConfigError>>()
                .map(Self::Map)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn resolve_rule(
    name: &str,
    rule: &RuleSpec,
    layers: &[&ValidatorRegistry],
) -> Result<ValidatorSpec, ConfigError> {
    let registered = || lookup(name, layers).ok_or_else(|| ConfigError::unknown_validator(name));

    let (definition, rule, local_message) = match rule {
        RuleSpec::Inline(definition) => (definition, Value::Null, None),
        RuleSpec::Default => (registered()?, Value::Null, None),
        RuleSpec::Arg(arg) => (registered()?, arg.clone(), None),
        RuleSpec::Detailed { rule, message } => (registered()?, default_arg(rule), message.clone()),
    };

    Ok(ValidatorSpec {
        name: name.to_string(),
        check: definition.check().clone(),
        rule,
        message: local_message.or_else(|| definition.message().cloned()),
    })
}

fn default_arg(rule: &Value) -> Value {
    match rule {
        Value::Bool(true) => Value::Null,
        other => other.clone(),
    }
}
