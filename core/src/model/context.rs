//! Exploration index document: explorer findings gathered during planning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explorer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub expected_explorers: Vec<String>,
    #[serde(default)]
    pub explorers: Vec<Explorer>,
    #[serde(default)]
    pub key_files: BTreeSet<String>,
    #[serde(default)]
    pub patterns: BTreeSet<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub exploration_complete: bool,
}

impl Context {
    pub fn recompute_complete(&mut self) {
        if self.expected_explorers.is_empty() {
            self.exploration_complete = false;
            return;
        }
        let have: BTreeSet<&str> = self.explorers.iter().map(|e| e.id.as_str()).collect();
        self.exploration_complete = self
            .expected_explorers
            .iter()
            .all(|id| have.contains(id.as_str()));
    }
}
