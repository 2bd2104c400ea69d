//! Named validator definitions and layered lookup.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ExecutionError, Rejection};

/// Type alias for boxed futures used in async validation.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type alias for check closures.
///
/// Receives the field value and the rule argument (`Value::Null` when the
/// rule asked for the default argument).
pub type CheckFn =
    Arc<dyn Fn(&Value, &Value) -> Result<CheckReturn, ExecutionError> + Send + Sync>;

/// Type alias for message formatting closures: `(field, rule_arg) -> message`.
pub type MessageFn = Arc<dyn Fn(&str, &Value) -> String + Send + Sync>;

/// What a check handed back.
///
/// Only an explicit `false` (or a rejection, for pending checks) fails. Any
/// other value passes, strings included.
pub enum CheckReturn {
    /// The check finished synchronously with this value.
    Ready(Value),
    /// The check settles later.
    Pending(BoxFuture<'static, Result<Value, Rejection>>),
}

impl CheckReturn {
    /// Check if the check is still running.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl fmt::Debug for CheckReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<bool> for CheckReturn {
    fn from(passed: bool) -> Self {
        Self::Ready(Value::Bool(passed))
    }
}

impl From<Value> for CheckReturn {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<String> for CheckReturn {
    fn from(text: String) -> Self {
        Self::Ready(Value::String(text))
    }
}

impl From<&str> for CheckReturn {
    fn from(text: &str) -> Self {
        Self::Ready(Value::String(text.to_string()))
    }
}

/// Where a failed validator's message comes from.
#[derive(Clone)]
pub enum MessageSource {
    /// Used literally.
    Text(String),
    /// Rendered from the field name and rule argument.
    Format(MessageFn),
}

impl MessageSource {
    /// Create a message source from a formatting closure.
    pub fn format<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) -> String + Send + Sync + 'static,
    {
        Self::Format(Arc::new(f))
    }

    /// Render the message for a field.
    pub fn render(&self, field: &str, rule: &Value) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Format(f) => f(field, rule),
        }
    }
}

impl fmt::Debug for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Format(_) => f.write_str("Format(..)"),
        }
    }
}

impl From<&str> for MessageSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A registered validator: a check plus an optional default message.
///
/// Immutable once built; clones share the closures.
#[derive(Clone)]
pub struct ValidatorDefinition {
    check: CheckFn,
    message: Option<MessageSource>,
}

impl ValidatorDefinition {
    /// Create a definition from a raw check.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<CheckReturn, ExecutionError> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
            message: None,
        }
    }

    /// Create a definition from a synchronous check.
    ///
    /// ```ignore
    /// let numeric = ValidatorDefinition::sync(|value, _| {
    ///     value.as_str().is_some_and(|s| s.parse::<i64>().is_ok())
    /// });
    /// ```
    pub fn sync<F, R>(check: F) -> Self
    where
        F: Fn(&Value, &Value) -> R + Send + Sync + 'static,
        R: Into<CheckReturn>,
    {
        Self::new(move |value, rule| Ok(check(value, rule).into()))
    }

    /// Create a definition from an asynchronous check.
    ///
    /// The check passes when the future resolves to anything but `false`,
    /// and fails when it resolves to `false` or rejects.
    ///
    /// ```ignore
    /// let exist = ValidatorDefinition::future(|value, _| async move {
    ///     if value == "dio" { Ok(()) } else { Err(Rejection::new()) }
    /// });
    /// ```
    pub fn future<F, Fut, R>(check: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Rejection>> + Send + 'static,
        R: Into<Value>,
    {
        Self::new(move |value, rule| {
            let fut = check(value.clone(), rule.clone());
            Ok(CheckReturn::Pending(Box::pin(async move {
                fut.await.map(Into::<Value>::into)
            })))
        })
    }

    /// Set the default message for this validator.
    pub fn with_message(mut self, message: impl Into<MessageSource>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Get the check closure.
    pub fn check(&self) -> &CheckFn {
        &self.check
    }

    /// Get the default message source (if any).
    pub fn message(&self) -> Option<&MessageSource> {
        self.message.as_ref()
    }
}

impl fmt::Debug for ValidatorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorDefinition")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A validator resolved for one field: the check, its argument and the
/// message source that won the override resolution.
#[derive(Clone)]
pub struct ValidatorSpec {
    pub name: String,
    pub check: CheckFn,
    pub rule: Value,
    pub message: Option<MessageSource>,
}

impl ValidatorSpec {
    /// Render the failure message for a field, if the validator has one.
    pub fn message_for(&self, field: &str) -> Option<String> {
        self.message
            .as_ref()
            .map(|source| source.render(field, &self.rule))
    }
}

impl fmt::Debug for ValidatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSpec")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A pool of named validators.
///
/// One lives in the process-wide [`ValidityConfig`](crate::config::ValidityConfig)
/// and each [`ValidationContext`](crate::config::ValidationContext) may carry a
/// local one that shadows it.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, ValidatorDefinition>,
}

impl ValidatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in validator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for registration in crate::builtins::registered_validators() {
            registry.register(registration.name, (registration.factory)());
        }
        registry
    }

    /// Register a validator, returning the definition it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        definition: ValidatorDefinition,
    ) -> Option<ValidatorDefinition> {
        self.validators.insert(name.into(), definition)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, definition: ValidatorDefinition) -> Self {
        self.register(name, definition);
        self
    }

    /// Remove a validator.
    pub fn unregister(&mut self, name: &str) -> Option<ValidatorDefinition> {
        self.validators.remove(name)
    }

    /// Get a validator by name.
    pub fn get(&self, name: &str) -> Option<&ValidatorDefinition> {
        self.validators.get(name)
    }

    /// Check if a validator is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Find a validator in layered registries, nearest layer first.
pub fn lookup<'a>(name: &str, layers: &[&'a ValidatorRegistry]) -> Option<&'a ValidatorDefinition> {
    layers.iter().find_map(|layer| layer.get(name))
}
