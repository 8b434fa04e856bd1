//! Record types persisted by the memory store.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Knowledge,
    Result,
    Error,
    Context,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Knowledge => "knowledge",
            EntryKind::Result => "result",
            EntryKind::Error => "error",
            EntryKind::Context => "context",
        }
    }
}

/// Entry payload: plain text or a structured value. Serialized untagged so
/// the persisted file stores strings as strings and objects as objects.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum EntryContent {
    Text(String),
    Structured(serde_json::Value),
}

impl EntryContent {
    /// Stable string rendering, used uniformly by search and summaries.
    pub fn render(&self) -> String {
        match self {
            EntryContent::Text(text) => text.clone(),
            EntryContent::Structured(value) => value.to_string(),
        }
    }
}

impl From<String> for EntryContent {
    fn from(value: String) -> Self {
        EntryContent::Text(value)
    }
}

impl From<&str> for EntryContent {
    fn from(value: &str) -> Self {
        EntryContent::Text(value.to_string())
    }
}

impl From<serde_json::Value> for EntryContent {
    fn from(value: serde_json::Value) -> Self {
        EntryContent::Structured(value)
    }
}

/// An immutable record of something an agent produced. The timestamp is
/// assigned by the store and is non-decreasing in insertion order.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: EntryContent,
    pub tags: Vec<String>,
}

impl MemoryEntry {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Shape accepted by [crate::core::memory::MemoryStore::store]; the store
/// fills in id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub agent_id: String,
    pub kind: EntryKind,
    pub content: EntryContent,
    pub tags: Vec<String>,
}

/// A bounded view of one entry, surfaced to agents assembling a prompt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextSummary {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub summary: String,
}
