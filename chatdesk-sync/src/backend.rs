//! Capabilities the engine consumes from the network layer.
//!
//! The engine never speaks HTTP or websockets itself; the embedding
//! application implements [`ChatBackend`] over whatever transport a channel
//! uses and hands it in at session construction. The push stream is
//! at-least-once: events may repeat and may arrive out of order relative to
//! sends; the reconciler makes that safe.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{ConversationSnapshot, HistoryPage, Message};

/// One event delivered by the push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A message event: a new inbound message, or the server echo of an
    /// outbound one.
    Message { message: Message },

    /// Ephemeral typing signal; never stored.
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: String,
        typing: bool,
    },
}

/// Live stream of push events for one conversation. Ends when the
/// connection drops; the session owns reconnection.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Network capabilities the synchronization engine depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Deliver `text` to the conversation. The confirmed message is also
    /// expected to come back through the push stream; the engine promotes
    /// its pending entry from that echo, not from this return value.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<Message>;

    /// Fetch a conversation together with its newest page of messages.
    async fn fetch_conversation(&self, conversation_id: &str) -> Result<ConversationSnapshot>;

    /// Fetch one page of older history. Pages count upward from the newest;
    /// page 1 is what the initial load returned.
    async fn fetch_older_messages(&self, conversation_id: &str, page: u32) -> Result<HistoryPage>;

    /// Open the push stream for a conversation.
    async fn subscribe(&self, conversation_id: &str, token: &str) -> Result<EventStream>;
}
