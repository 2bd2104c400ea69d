//! Interaction history of a field: touched, dirty and modified.

use serde_json::Value;

/// Interaction-derived flags of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionFlags {
    pub dirty: bool,
    pub touched: bool,
    pub modified: bool,
}

/// Tracks a field's value against its baseline.
///
/// `dirty` and `touched` are sticky: once set they stay set until
/// [`reset`](Self::reset). `modified` is derived from the current value and
/// flips back when the value returns to the baseline.
#[derive(Debug, Clone)]
pub struct InteractionState {
    initial: Value,
    current: Value,
    touched: bool,
    dirty: bool,
}

impl InteractionState {
    /// Start tracking from a baseline value.
    pub fn new(initial: Value) -> Self {
        Self {
            current: initial.clone(),
            initial,
            touched: false,
            dirty: false,
        }
    }

    /// Record a new value.
    pub fn value_changed(&mut self, value: Value) {
        self.current = value;
        self.dirty = true;
    }

    /// Record a blur.
    pub fn blurred(&mut self) {
        self.touched = true;
    }

    /// Return to the baseline with clean flags.
    pub fn reset(&mut self) {
        self.current = self.initial.clone();
        self.dirty = false;
        self.touched = false;
    }

    /// Replace the baseline value.
    pub fn set_initial(&mut self, initial: Value) {
        self.initial = initial;
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn touched(&self) -> bool {
        self.touched
    }

    pub fn modified(&self) -> bool {
        self.current != self.initial
    }

    /// Snapshot of the three flags.
    pub fn flags(&self) -> InteractionFlags {
        InteractionFlags {
            dirty: self.dirty,
            touched: self.touched,
            modified: self.modified(),
        }
    }
}
