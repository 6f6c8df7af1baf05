//! Reconciliation of push-stream events into engine state.
//!
//! Every stream event funnels through [`apply`]; there is no other write
//! path from the network side. The function is total over its inputs:
//! malformed events are dropped with a warning, duplicates are no-ops, and
//! nothing here can break the delivery loop.

use tracing::{debug, warn};

use crate::backend::StreamEvent;
use crate::config::SyncConfig;
use crate::events::SyncEvent;
use crate::model::{Direction, Message};
use crate::session::SessionState;
use crate::store::MergeOutcome;

/// Merge one stream event, returning the events to surface to the rendering
/// layer.
pub(crate) fn apply(
    state: &mut SessionState,
    event: StreamEvent,
    config: &SyncConfig,
) -> Vec<SyncEvent> {
    match event {
        StreamEvent::Typing {
            conversation_id,
            typing,
        } => {
            let open = state
                .open
                .as_ref()
                .is_some_and(|o| o.conversation.id == conversation_id);
            if open {
                vec![SyncEvent::PeerTyping {
                    conversation_id,
                    typing,
                }]
            } else {
                Vec::new()
            }
        }
        StreamEvent::Message { message } => apply_message(state, message, config),
    }
}

fn apply_message(
    state: &mut SessionState,
    message: Message,
    config: &SyncConfig,
) -> Vec<SyncEvent> {
    if message.conversation_id.is_empty() || message.id.is_none() {
        warn!(
            "dropping malformed stream event (id={:?}, conversation={:?})",
            message.id, message.conversation_id
        );
        return Vec::new();
    }

    let mut out = Vec::new();
    let conversation_id = message.conversation_id.clone();
    let preview = message.content.clone();
    let bump_at = message.delivered_at.unwrap_or(message.created_at);
    let inbound = message.direction == Direction::Inbound;

    let mut is_open = false;
    if let Some(open) = state
        .open
        .as_mut()
        .filter(|o| o.conversation.id == conversation_id)
    {
        is_open = true;
        match open.window.merge_confirmed(message.clone(), config.match_window()) {
            MergeOutcome::Duplicate => {
                debug!("duplicate delivery of {:?} ignored", message.id);
            }
            MergeOutcome::Promoted { temp_id } => {
                // the send's rollback bookkeeping is no longer needed
                state.outbox.settle(&temp_id);
                out.push(SyncEvent::MessagePromoted {
                    conversation_id: conversation_id.clone(),
                    temp_id,
                    message: message.clone(),
                });
            }
            MergeOutcome::Inserted => {
                out.push(SyncEvent::MessageAppended {
                    conversation_id: conversation_id.clone(),
                    message: message.clone(),
                });
            }
        }
        if let Some(mode) = open.viewport.follow_tail(open.window.tail_key()) {
            out.push(SyncEvent::FollowTail {
                conversation_id: conversation_id.clone(),
                mode,
            });
        }
    }

    // the conversation list reorders for every message event, open or not
    if state.roster.bump(&conversation_id, preview, bump_at).is_some() {
        if inbound && !is_open {
            state.roster.increment_unread(&conversation_id);
        }
        out.push(SyncEvent::RosterChanged);
    } else {
        debug!("stream event for conversation {conversation_id} not in roster");
    }

    out
}
