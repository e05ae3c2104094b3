use serde::{Deserialize, Serialize};
use serde_json::Value;
use uifunnel_core_types::{ElementRecord, PageMeta};

use crate::judges;

/// One observation of a page: its elements in document order plus metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub page: PageMeta,
}

impl PageSnapshot {
    pub fn new(elements: Vec<ElementRecord>, page: PageMeta) -> Self {
        Self { elements, page }
    }

    pub fn element(&self, id: i64) -> Option<&ElementRecord> {
        self.elements.iter().find(|element| element.id == id)
    }

    pub fn visible_ids(&self) -> Vec<i64> {
        self.elements
            .iter()
            .filter(|element| judges::visible(element).ok)
            .map(|element| element.id)
            .collect()
    }

    pub fn interactive_ids(&self) -> Vec<i64> {
        self.elements
            .iter()
            .filter(|element| judges::is_interactive(element))
            .map(|element| element.id)
            .collect()
    }

    /// Concatenated visible text, used by text assertions.
    pub fn visible_text(&self) -> String {
        self.elements
            .iter()
            .filter(|element| element.visible && !element.text.trim().is_empty())
            .map(|element| element.text.trim())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub ok: bool,
    pub reason: String,
    pub facts: Value,
}
