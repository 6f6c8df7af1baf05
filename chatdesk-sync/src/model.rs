//! Conversation and message domain types.
//!
//! These are the shapes the synchronization engine reconciles. Field names
//! serialize as camelCase to match the backend wire format.
//!
//! A [`Message`] exists in one of two forms: a *pending* entry created
//! client-side at send time (`id` empty, `temp_id` set) or a *confirmed*
//! entry assigned an id by the server. Pending entries are promoted in place
//! once the server echoes them back; the engine never deletes a confirmed
//! message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a message relative to the workspace user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Sent by an agent from this workspace.
    Outbound,
    /// Received from the contact (or another device/agent).
    Inbound,
}

/// Delivery state of a message.
///
/// Only `Sending` and `Failed` are interesting to the engine; everything
/// confirmed by the server is `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    Sending,
    Sent,
    Failed,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned identifier, monotonically increasing within a
    /// conversation. Empty while the send is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Client-generated identifier, unique per pending send. Backends that
    /// support idempotency keys echo it back on the confirmed message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Owning conversation.
    pub conversation_id: String,

    /// Opaque text payload. Structured template messages arrive as prefixed
    /// text parsed at render time; the engine must never rewrite this.
    pub content: String,

    pub direction: Direction,

    pub delivery: DeliveryState,

    pub created_at: DateTime<Utc>,

    /// Set by the server on delivery; absent for pending messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Construct a pending outbound message with a fresh temp id.
    pub fn pending(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            temp_id: Some(Uuid::new_v4().to_string()),
            conversation_id: conversation_id.into(),
            content: content.into(),
            direction: Direction::Outbound,
            delivery: DeliveryState::Sending,
            created_at: Utc::now(),
            delivered_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }

    /// Stable render key: the server id once confirmed, the temp id before.
    pub fn key(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => self.temp_id.clone().unwrap_or_default(),
        }
    }
}

/// Pipeline priority of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A conversation as shown in the list view.
///
/// Owns at most one materialized message window (the paginated slice held by
/// the session), never the full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,

    /// Contact display name or channel handle.
    pub contact: String,

    /// Source channel tag ("whatsapp", "webchat", "email", ...).
    pub channel: String,

    pub last_message_preview: String,

    pub last_message_at: DateTime<Utc>,

    #[serde(default)]
    pub unread_count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_stage_id: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,

    #[serde(default)]
    pub archived: bool,
}

/// Initial load of a conversation: the newest page of messages plus paging
/// bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    /// Highest page number the backend will serve for this conversation.
    pub last_page: u32,
}

/// One page of older history. Pages count upward from the newest; the
/// initial load is page 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub page: u32,
    pub last_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_message_shape() {
        let message = Message::pending("conv-1", "hello");
        assert!(message.is_pending());
        assert!(!message.is_confirmed());
        assert!(message.temp_id.is_some());
        assert_eq!(message.direction, Direction::Outbound);
        assert_eq!(message.delivery, DeliveryState::Sending);
        assert!(message.delivered_at.is_none());
    }

    #[test]
    fn test_render_key() {
        let pending = Message::pending("conv-1", "hello");
        assert_eq!(pending.key(), pending.temp_id.clone().unwrap());

        let mut confirmed = pending.clone();
        confirmed.id = Some(42);
        assert_eq!(confirmed.key(), "42");
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let mut message = Message::pending("conv-1", "hello");
        message.id = Some(7);
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("conversationId").is_some());
        assert!(json.get("tempId").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json.get("delivery").unwrap(), "sending");
    }

    #[test]
    fn test_conversation_defaults() {
        let json = serde_json::json!({
            "id": "conv-1",
            "contact": "Ada",
            "channel": "webchat",
            "lastMessagePreview": "hi",
            "lastMessageAt": "2026-01-01T00:00:00Z",
        });
        let conversation: Conversation = serde_json::from_value(json).unwrap();
        assert_eq!(conversation.unread_count, 0);
        assert_eq!(conversation.priority, Priority::Normal);
        assert!(!conversation.archived);
    }
}
