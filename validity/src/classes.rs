//! State class names for the binding layer.
//!
//! The core only decides which names apply; putting them on elements is the
//! binding layer's job.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::result::Flags;

/// Resolved class name for each state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNames {
    pub valid: String,
    pub invalid: String,
    pub touched: String,
    pub untouched: String,
    pub pristine: String,
    pub dirty: String,
    pub modified: String,
}

impl Default for ClassNames {
    fn default() -> Self {
        Self {
            valid: "valid".to_string(),
            invalid: "invalid".to_string(),
            touched: "touched".to_string(),
            untouched: "untouched".to_string(),
            pristine: "pristine".to_string(),
            dirty: "dirty".to_string(),
            modified: "modified".to_string(),
        }
    }
}

/// A partial set of class names layered over the defaults.
///
/// ```ignore
/// let overrides = ClassOverrides::from_json(r#"{"valid": "is-valid", "invalid": "is-invalid"}"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassOverrides {
    pub valid: Option<String>,
    pub invalid: Option<String>,
    pub touched: Option<String>,
    pub untouched: Option<String>,
    pub pristine: Option<String>,
    pub dirty: Option<String>,
    pub modified: Option<String>,
}

impl ClassOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse overrides from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl ClassNames {
    /// Resolve layered overrides, nearest layer first, over the defaults.
    pub fn resolve(layers: &[&ClassOverrides]) -> Self {
        let defaults = Self::default();
        let pick = |select: fn(&ClassOverrides) -> &Option<String>, fallback: String| {
            layers
                .iter()
                .find_map(|layer| select(layer).clone())
                .unwrap_or(fallback)
        };

        Self {
            valid: pick(|o| &o.valid, defaults.valid),
            invalid: pick(|o| &o.invalid, defaults.invalid),
            touched: pick(|o| &o.touched, defaults.touched),
            untouched: pick(|o| &o.untouched, defaults.untouched),
            pristine: pick(|o| &o.pristine, defaults.pristine),
            dirty: pick(|o| &o.dirty, defaults.dirty),
            modified: pick(|o| &o.modified, defaults.modified),
        }
    }

    /// Class names that apply to a state.
    ///
    /// `valid`/`invalid` only apply once the field has been validated since
    /// it was created or last reset.
    pub fn for_state(&self, flags: Flags, validated: bool) -> Vec<&str> {
        let mut classes = Vec::with_capacity(4);
        classes.push(if flags.touched { &self.touched } else { &self.untouched });
        classes.push(if flags.dirty { &self.dirty } else { &self.pristine });
        if flags.modified {
            classes.push(&self.modified);
        }
        if validated {
            classes.push(if flags.valid { &self.valid } else { &self.invalid });
        }
        classes.into_iter().map(String::as_str).collect()
    }
}
