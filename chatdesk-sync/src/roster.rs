//! Conversation list ordering.
//!
//! The list view renders the roster verbatim, so every mutation here must
//! leave it ordered by `last_message_at` descending. A new last message
//! splices its conversation to the front; everything else keeps its relative
//! order.

use chrono::{DateTime, Utc};

use crate::model::Conversation;

/// Preview fields remembered before a bump so a failed send can restore
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSnapshot {
    pub preview: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered conversation list, most recent first.
#[derive(Debug, Clone, Default)]
pub struct ConversationRoster {
    entries: Vec<Conversation>,
}

impl ConversationRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list (initial load or refresh).
    pub fn replace_all(&mut self, mut entries: Vec<Conversation>) {
        entries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        self.entries = entries;
    }

    pub fn entries(&self) -> &[Conversation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.entries.iter().find(|c| c.id == id)
    }

    /// Move `id` to the front with a fresh preview and timestamp.
    ///
    /// Returns the prior preview fields for rollback, or `None` when the
    /// conversation is not in the list.
    pub fn bump(
        &mut self,
        id: &str,
        preview: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Option<PreviewSnapshot> {
        let idx = self.entries.iter().position(|c| c.id == id)?;
        let mut entry = self.entries.remove(idx);
        let prior = PreviewSnapshot {
            preview: entry.last_message_preview.clone(),
            timestamp: entry.last_message_at,
        };
        entry.last_message_preview = preview.into();
        entry.last_message_at = at;
        self.entries.insert(0, entry);
        Some(prior)
    }

    /// Undo a bump after a failed send. The entry slots back to wherever its
    /// restored timestamp puts it.
    pub fn restore(&mut self, id: &str, prior: PreviewSnapshot) {
        let Some(idx) = self.entries.iter().position(|c| c.id == id) else {
            return;
        };
        let mut entry = self.entries.remove(idx);
        entry.last_message_preview = prior.preview;
        entry.last_message_at = prior.timestamp;
        let at = self
            .entries
            .partition_point(|c| c.last_message_at > entry.last_message_at);
        self.entries.insert(at, entry);
    }

    pub fn increment_unread(&mut self, id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|c| c.id == id) {
            entry.unread_count = entry.unread_count.saturating_add(1);
        }
    }

    pub fn clear_unread(&mut self, id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|c| c.id == id) {
            entry.unread_count = 0;
        }
    }
}
