//! Method references collected while a calculation runs.

use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MethodReference {
    pub key: String,
    pub description: String,
}

/// Ordered, duplicate-free list of the methods a run relied on.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ProvenanceLog {
    entries: Vec<MethodReference>,
}

impl ProvenanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference unless its key is already present.
    pub fn record(&mut self, key: &str, description: &str) {
        if !self.contains(key) {
            self.entries.push(MethodReference { key: key.to_string(), description: description.to_string() });
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|r| r.key == key)
    }

    pub fn entries(&self) -> &[MethodReference] {
        &self.entries
    }
}
