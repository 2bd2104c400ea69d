//! Per-validator progress, mirroring in-flight checks.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Progress of one validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Progress {
    /// Not running (`''`).
    #[default]
    Idle,
    /// Started and not yet committed (`'running'`).
    Running,
}

impl Progress {
    /// The string form used by the binding layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Running => "running",
        }
    }
}

impl Serialize for Progress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Validator name → progress, in declaration order.
///
/// Every configured validator has an entry; all entries are idle once a run
/// has fully settled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProgressMap {
    entries: IndexMap<String, Progress>,
}

impl ProgressMap {
    /// Create an idle map for the given validators.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: names
                .into_iter()
                .map(|name| (name.to_string(), Progress::Idle))
                .collect(),
        }
    }

    /// Mark a validator as running.
    pub fn set_running(&mut self, name: &str) {
        if let Some(progress) = self.entries.get_mut(name) {
            *progress = Progress::Running;
        }
    }

    /// Mark a validator as idle.
    pub fn clear(&mut self, name: &str) {
        if let Some(progress) = self.entries.get_mut(name) {
            *progress = Progress::Idle;
        }
    }

    /// Mark every validator as idle.
    pub fn reset(&mut self) {
        self.entries.values_mut().for_each(|p| *p = Progress::Idle);
    }

    /// Get a validator's progress.
    pub fn get(&self, name: &str) -> Option<Progress> {
        self.entries.get(name).copied()
    }

    /// Check if any validator is running.
    pub fn is_running(&self) -> bool {
        self.entries.values().any(|p| *p == Progress::Running)
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Progress)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), *p))
    }

    /// Number of tracked validators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no validators are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut map = ProgressMap::new(["required", "exist"]);
        assert!(!map.is_running());

        map.set_running("exist");
        assert_eq!(map.get("exist"), Some(Progress::Running));
        assert_eq!(map.get("required"), Some(Progress::Idle));
        assert!(map.is_running());

        map.clear("exist");
        assert!(!map.is_running());

        map.set_running("unknown");
        assert_eq!(map.get("unknown"), None);
    }

    #[test]
    fn test_serializes_to_strings() {
        let mut map = ProgressMap::new(["required", "exist"]);
        map.set_running("exist");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"required":"","exist":"running"}"#);
    }
}
