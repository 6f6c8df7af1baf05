//! Events the engine surfaces to the rendering layer.

use crate::model::Message;
use crate::viewport::FollowMode;

/// Events emitted by a [`SyncSession`](crate::session::SyncSession).
///
/// The rendering layer drains these from the receiver handed out at session
/// construction and applies them to the widget tree. Events describe what
/// already happened to engine state; snapshots
/// ([`open_view`](crate::session::SyncSession::open_view),
/// [`roster`](crate::session::SyncSession::roster)) are the source of truth
/// for a full re-render.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The open conversation finished materializing.
    ConversationLoaded { conversation_id: String },

    /// Initial load failed; show an error state instead of the view.
    LoadFailed {
        conversation_id: String,
        reason: String,
    },

    /// A new message landed at the tail of the open window (pending or
    /// confirmed).
    MessageAppended {
        conversation_id: String,
        message: Message,
    },

    /// A pending entry was confirmed in place.
    MessagePromoted {
        conversation_id: String,
        temp_id: String,
        message: Message,
    },

    /// An optimistic send failed and was rolled back. `content` carries the
    /// original text so the input can be refilled for retry.
    SendFailed {
        conversation_id: String,
        content: String,
        reason: String,
    },

    /// Older history was prepended to the window. The view re-lays out and
    /// reports the new content height back via
    /// [`report_reflow`](crate::session::SyncSession::report_reflow).
    HistoryPrepended {
        conversation_id: String,
        added: usize,
    },

    /// A history fetch failed; the cursor is unchanged and scrolling up
    /// again retries.
    HistoryFailed {
        conversation_id: String,
        reason: String,
    },

    /// Scroll offset to apply after a prepend re-layout.
    RestoreScroll {
        conversation_id: String,
        offset: f64,
    },

    /// Follow the tail after an append.
    FollowTail {
        conversation_id: String,
        mode: FollowMode,
    },

    /// Conversation list order, previews, or unread counts changed.
    RosterChanged,

    /// The contact started or stopped typing in the open conversation.
    PeerTyping {
        conversation_id: String,
        typing: bool,
    },

    /// The push stream dropped; reconnection is in progress.
    StreamLost { conversation_id: String },

    /// The push stream is back and missed messages were backfilled.
    StreamRestored { conversation_id: String },
}

impl SyncEvent {
    /// Conversation this event concerns, when it concerns one.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            SyncEvent::ConversationLoaded { conversation_id }
            | SyncEvent::LoadFailed {
                conversation_id, ..
            }
            | SyncEvent::MessageAppended {
                conversation_id, ..
            }
            | SyncEvent::MessagePromoted {
                conversation_id, ..
            }
            | SyncEvent::SendFailed {
                conversation_id, ..
            }
            | SyncEvent::HistoryPrepended {
                conversation_id, ..
            }
            | SyncEvent::HistoryFailed {
                conversation_id, ..
            }
            | SyncEvent::RestoreScroll {
                conversation_id, ..
            }
            | SyncEvent::FollowTail {
                conversation_id, ..
            }
            | SyncEvent::PeerTyping {
                conversation_id, ..
            }
            | SyncEvent::StreamLost { conversation_id }
            | SyncEvent::StreamRestored { conversation_id } => Some(conversation_id),
            SyncEvent::RosterChanged => None,
        }
    }

    /// Whether this event should surface a user-visible notice.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SyncEvent::LoadFailed { .. }
                | SyncEvent::SendFailed { .. }
                | SyncEvent::HistoryFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_extraction() {
        let event = SyncEvent::StreamLost {
            conversation_id: "conv-1".to_string(),
        };
        assert_eq!(event.conversation_id(), Some("conv-1"));
        assert_eq!(SyncEvent::RosterChanged.conversation_id(), None);
    }

    #[test]
    fn test_failure_classification() {
        let event = SyncEvent::SendFailed {
            conversation_id: "conv-1".to_string(),
            content: "hi".to_string(),
            reason: "network".to_string(),
        };
        assert!(event.is_failure());

        let event = SyncEvent::ConversationLoaded {
            conversation_id: "conv-1".to_string(),
        };
        assert!(!event.is_failure());
    }
}
