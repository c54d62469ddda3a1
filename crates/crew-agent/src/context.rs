//! Conversation context window
//!
//! Storage is unbounded (full audit trail); only the replay window is bounded.

use crew_core::truncate_chars;
use serde::{Deserialize, Serialize};

/// Maximum characters stored per memory entry
pub const MEMORY_ENTRY_CAP: usize = 500;

/// Number of recent entries replayed into each invocation
pub const REPLAY_WINDOW: usize = 5;

/// Who produced a memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The task given to the agent
    User,
    /// A durable utterance produced by the agent
    Assistant,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::User => write!(f, "user"),
            Origin::Assistant => write!(f, "assistant"),
        }
    }
}

/// One stored exchange fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub origin: Origin,
    pub content: String,
}

/// Ordered, append-only conversation memory
#[derive(Debug, Clone)]
pub struct ContextWindow {
    entries: Vec<MemoryEntry>,
    cap: usize,
}

impl ContextWindow {
    pub fn new() -> Self {
        Self::with_cap(MEMORY_ENTRY_CAP)
    }

    /// Memory with a custom per-entry character cap
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    /// Store `content`, truncated to the entry cap
    pub fn append(&mut self, origin: Origin, content: &str) {
        self.entries.push(MemoryEntry {
            origin,
            content: truncate_chars(content, self.cap),
        });
    }

    /// Last `k` entries as `[origin]: content`, separated by blank lines
    pub fn render_recent(&self, k: usize) -> String {
        self.recent(k)
            .iter()
            .map(|entry| format!("[{}]: {}", entry.origin, entry.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Last `k` entries, or all of them when fewer exist
    pub fn recent(&self, k: usize) -> &[MemoryEntry] {
        let start = self.entries.len().saturating_sub(k);
        &self.entries[start..]
    }

    /// Discard every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new()
    }
}
