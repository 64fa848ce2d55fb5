use crate::model::TreeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Preference that lets non-administrators edit raw GEDCOM.
pub const PREF_SHOW_GEDCOM_RECORD: &str = "SHOW_GEDCOM_RECORD";

/// A family tree: the isolation scope for xrefs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub name: String, // URL-safe name, used in routes
    pub title: String,
    #[serde(default)]
    pub preferences: HashMap<String, String>,
}

impl Tree {
    pub fn new(id: TreeId, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            title: title.into(),
            preferences: HashMap::new(),
        }
    }

    pub fn with_preference(mut self, key: &str, value: &str) -> Self {
        self.preferences.insert(key.to_string(), value.to_string());
        self
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    /// Boolean preferences are stored as "1"/"0".
    pub fn preference_enabled(&self, key: &str) -> bool {
        self.preference(key) == Some("1")
    }
}
