//! Reference definitions for referenced links and images.

use std::collections::HashMap;

/// A stored reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub attribute_specifications: String,
    pub uri: String,
    pub title: Option<String>,
}

/// Lookup of a label that was never defined.
#[derive(Debug, thiserror::Error)]
#[error("unrecognised label `{0}`")]
pub struct UnrecognisedLabel(pub String);

/// Definitions keyed by case-insensitive label.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    reference_from_label: HashMap<String, Reference>,
}

impl ReferenceTable {
    /// Store a definition, replacing any earlier one with the same label.
    pub fn store(&mut self, label: &str, reference: Reference) {
        self.reference_from_label.insert(label.to_lowercase(), reference);
    }

    pub fn load(&self, label: &str) -> Result<&Reference, UnrecognisedLabel> {
        self.reference_from_label
            .get(&label.to_lowercase())
            .ok_or_else(|| UnrecognisedLabel(label.to_owned()))
    }
}
