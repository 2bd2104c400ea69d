//! Process-wide configuration and per-context overrides.
//!
//! There are no ambient globals: a [`ValidityConfig`] is built once at
//! startup, shared through an `Arc`, and every [`ValidationContext`] layers
//! its local validators and class names on top of it.

use std::sync::Arc;

use serde_json::Value;

use crate::classes::{ClassNames, ClassOverrides};
use crate::error::ConfigError;
use crate::field::Validity;
use crate::registry::{ValidatorDefinition, ValidatorRegistry, ValidatorSpec};
use crate::rules::ValidatorRef;

/// Process-wide validator registry and class-name overrides.
///
/// Mutable while it is being built, read-only once shared.
#[derive(Debug, Clone)]
pub struct ValidityConfig {
    validators: ValidatorRegistry,
    classes: ClassOverrides,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidityConfig {
    /// Create a config with the built-in validators registered.
    pub fn new() -> Self {
        let validators = ValidatorRegistry::with_builtins();
        log::debug!("Registered {} built-in validators", validators.len());
        Self {
            validators,
            classes: ClassOverrides::default(),
        }
    }

    /// Create a config without any validators.
    pub fn empty() -> Self {
        Self {
            validators: ValidatorRegistry::new(),
            classes: ClassOverrides::default(),
        }
    }

    /// Register (or override) a process-wide validator.
    pub fn with_validator(mut self, name: impl Into<String>, definition: ValidatorDefinition) -> Self {
        self.validators.register(name, definition);
        self
    }

    /// Set the process-wide class-name overrides.
    pub fn with_classes(mut self, classes: ClassOverrides) -> Self {
        self.classes = classes;
        self
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn classes(&self) -> &ClassOverrides {
        &self.classes
    }

    /// Share the finished config.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// A local scope for fields: local validators and class names shadow the
/// process-wide ones.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    config: Arc<ValidityConfig>,
    validators: ValidatorRegistry,
    classes: ClassOverrides,
}

impl ValidationContext {
    /// Create a context without local overrides.
    pub fn new(config: Arc<ValidityConfig>) -> Self {
        Self {
            config,
            validators: ValidatorRegistry::new(),
            classes: ClassOverrides::default(),
        }
    }

    /// Register a local validator.
    pub fn with_validator(mut self, name: impl Into<String>, definition: ValidatorDefinition) -> Self {
        self.validators.register(name, definition);
        self
    }

    /// Set local class-name overrides.
    pub fn with_classes(mut self, classes: ClassOverrides) -> Self {
        self.classes = classes;
        self
    }

    pub fn config(&self) -> &Arc<ValidityConfig> {
        &self.config
    }

    /// Resolve a validator reference: local registry first, then process-wide.
    pub fn resolve(&self, reference: &ValidatorRef) -> Result<Vec<ValidatorSpec>, ConfigError> {
        reference.resolve(&[&self.validators, self.config.validators()])
    }

    /// Class names: local overrides, then process-wide, then defaults.
    pub fn class_names(&self) -> ClassNames {
        ClassNames::resolve(&[&self.classes, self.config.classes()])
    }

    /// Attach a field in this context.
    ///
    /// Fails with [`ConfigError::UnknownValidator`] if a validator cannot be
    /// resolved.
    pub fn field(
        &self,
        name: impl Into<String>,
        initial: impl Into<Value>,
        validators: impl Into<ValidatorRef>,
    ) -> Result<Validity, ConfigError> {
        Validity::new(self, name, initial.into(), validators.into())
    }
}
