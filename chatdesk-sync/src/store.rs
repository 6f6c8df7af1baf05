//! Per-conversation message window.
//!
//! Holds the currently materialized slice of a conversation's history plus
//! the merge operations used by the send pipeline, the stream reconciler,
//! and the paginator. Invariant after every mutation: confirmed messages
//! ascend strictly by id and precede all pending entries; pending entries
//! keep their send order.

use chrono::Duration;
use tracing::debug;

use crate::model::{DeliveryState, Direction, Message};

/// Outcome of merging a confirmed message into the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The id was already present (or the message carried none); nothing
    /// changed.
    Duplicate,
    /// A pending entry was replaced in place.
    Promoted { temp_id: String },
    /// The message was inserted as new.
    Inserted,
}

/// Ordered window over one conversation's messages.
#[derive(Debug, Clone, Default)]
pub struct MessageWindow {
    messages: Vec<Message>,
}

impl MessageWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole window with an initial load.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.normalize();
        self.messages
            .dedup_by(|a, b| a.id.is_some() && a.id == b.id);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.messages.iter().any(|m| m.id == Some(id))
    }

    /// Render key of the last message, pending or confirmed.
    pub fn tail_key(&self) -> Option<String> {
        self.messages.last().map(Message::key)
    }

    /// Highest confirmed id currently in the window.
    pub fn last_confirmed_id(&self) -> Option<i64> {
        self.messages.iter().rev().find_map(|m| m.id)
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }

    /// Append an optimistic entry at the tail.
    pub fn append_pending(&mut self, message: Message) {
        debug_assert!(message.is_pending());
        self.messages.push(message);
    }

    /// Remove a pending entry by temp id, returning it.
    pub fn remove_pending(&mut self, temp_id: &str) -> Option<Message> {
        let idx = self
            .messages
            .iter()
            .position(|m| m.is_pending() && m.temp_id.as_deref() == Some(temp_id))?;
        Some(self.messages.remove(idx))
    }

    /// Merge a server-confirmed message into the window.
    ///
    /// Duplicate ids are ignored. A matching pending entry (temp-id echo
    /// first, content/time heuristic as the fallback) is replaced in place;
    /// otherwise the message is inserted in id order (normally the tail of
    /// the confirmed region).
    pub fn merge_confirmed(&mut self, incoming: Message, match_window: Duration) -> MergeOutcome {
        let Some(id) = incoming.id else {
            debug!("ignoring confirmed merge without an id");
            return MergeOutcome::Duplicate;
        };
        if self.contains_id(id) {
            return MergeOutcome::Duplicate;
        }

        if let Some(idx) = self.find_pending_match(&incoming, match_window) {
            let temp_id = self.messages[idx].temp_id.clone().unwrap_or_default();
            self.messages[idx] = incoming;
            self.normalize();
            return MergeOutcome::Promoted { temp_id };
        }

        let at = self.confirmed_insert_index(id);
        self.messages.insert(at, incoming);
        MergeOutcome::Inserted
    }

    /// Prepend a page of older history, dropping ids already present.
    /// Returns how many messages survived the dedup.
    pub fn prepend_older(&mut self, fetched: Vec<Message>) -> usize {
        let mut fresh: Vec<Message> = fetched
            .into_iter()
            .filter(|m| match m.id {
                Some(id) => !self.contains_id(id),
                // history pages never carry pending entries
                None => false,
            })
            .collect();
        fresh.sort_by_key(|m| m.id);
        fresh.dedup_by(|a, b| a.id == b.id);
        if fresh.is_empty() {
            return 0;
        }
        let added = fresh.len();
        fresh.append(&mut self.messages);
        self.messages = fresh;
        self.normalize();
        added
    }

    /// Locate the pending entry a confirmed message belongs to, if any.
    fn find_pending_match(&self, incoming: &Message, match_window: Duration) -> Option<usize> {
        // an echoed idempotency key wins outright
        if let Some(echo) = incoming.temp_id.as_deref() {
            if let Some(idx) = self
                .messages
                .iter()
                .position(|m| m.is_pending() && m.temp_id.as_deref() == Some(echo))
            {
                return Some(idx);
            }
        }

        if incoming.direction != Direction::Outbound {
            return None;
        }
        self.messages.iter().position(|m| {
            m.is_pending()
                && m.delivery == DeliveryState::Sending
                && m.direction == Direction::Outbound
                && m.content == incoming.content
                && (incoming.created_at - m.created_at).abs() <= match_window
        })
    }

    /// Insertion point that keeps confirmed ids ascending. The window is
    /// always `[confirmed ascending..., pending...]`, so the predicate is
    /// monotone.
    fn confirmed_insert_index(&self, id: i64) -> usize {
        self.messages.partition_point(|m| match m.id {
            Some(existing) => existing < id,
            None => false,
        })
    }

    /// Restore the ordering invariant after an in-place mutation. Stable, so
    /// pending entries keep their relative order.
    fn normalize(&mut self) {
        self.messages
            .sort_by_key(|m| (m.id.is_none(), m.id.unwrap_or(i64::MAX)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn confirmed(id: i64, conversation: &str, content: &str) -> Message {
        Message {
            id: Some(id),
            temp_id: None,
            conversation_id: conversation.to_string(),
            content: content.to_string(),
            direction: Direction::Inbound,
            delivery: DeliveryState::Sent,
            created_at: Utc::now(),
            delivered_at: Some(Utc::now()),
        }
    }

    fn window() -> Duration {
        Duration::seconds(5)
    }

    fn assert_invariant(store: &MessageWindow) {
        let ids: Vec<i64> = store.messages().iter().filter_map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted, "confirmed ids must ascend without repeats");

        let first_pending = store.messages().iter().position(|m| m.is_pending());
        if let Some(first_pending) = first_pending {
            assert!(
                store.messages()[first_pending..].iter().all(|m| m.is_pending()),
                "pending entries must all sit after the confirmed region"
            );
        }
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut store = MessageWindow::new();
        for id in [3, 1, 2, 5, 4] {
            store.merge_confirmed(confirmed(id, "c", "x"), window());
            assert_invariant(&store);
        }
        let ids: Vec<i64> = store.messages().iter().filter_map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_merge_ignores_duplicates() {
        let mut store = MessageWindow::new();
        assert_eq!(
            store.merge_confirmed(confirmed(1, "c", "x"), window()),
            MergeOutcome::Inserted
        );
        assert_eq!(
            store.merge_confirmed(confirmed(1, "c", "x"), window()),
            MergeOutcome::Duplicate
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pending_stays_after_confirmed() {
        let mut store = MessageWindow::new();
        store.merge_confirmed(confirmed(1, "c", "a"), window());
        store.append_pending(Message::pending("c", "draft"));
        store.merge_confirmed(confirmed(2, "c", "b"), window());
        assert_invariant(&store);
        assert!(store.messages().last().unwrap().is_pending());
    }

    #[test]
    fn test_promotion_by_temp_id_echo() {
        let mut store = MessageWindow::new();
        let pending = Message::pending("c", "hello");
        let temp_id = pending.temp_id.clone().unwrap();
        store.append_pending(pending);

        let mut echo = confirmed(10, "c", "hello");
        echo.direction = Direction::Outbound;
        echo.temp_id = Some(temp_id.clone());
        // content differs on purpose: the echo must win without a heuristic
        echo.content = "hello (edited server-side)".to_string();

        let outcome = store.merge_confirmed(echo, window());
        assert_eq!(outcome, MergeOutcome::Promoted { temp_id });
        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].is_confirmed());
        assert_invariant(&store);
    }

    #[test]
    fn test_promotion_by_heuristic() {
        let mut store = MessageWindow::new();
        store.merge_confirmed(confirmed(1, "c", "earlier"), window());
        let pending = Message::pending("c", "hello");
        store.append_pending(pending);

        let mut echo = confirmed(2, "c", "hello");
        echo.direction = Direction::Outbound;

        match store.merge_confirmed(echo, window()) {
            MergeOutcome::Promoted { .. } => {}
            other => panic!("expected promotion, got {:?}", other),
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.pending_count(), 0);
        assert_invariant(&store);
    }

    #[test]
    fn test_heuristic_rejects_outside_window() {
        let mut store = MessageWindow::new();
        let mut pending = Message::pending("c", "hello");
        pending.created_at = Utc::now() - Duration::seconds(30);
        store.append_pending(pending);

        let mut echo = confirmed(2, "c", "hello");
        echo.direction = Direction::Outbound;

        assert_eq!(store.merge_confirmed(echo, window()), MergeOutcome::Inserted);
        assert_eq!(store.pending_count(), 1);
        assert_invariant(&store);
    }

    #[test]
    fn test_heuristic_rejects_inbound() {
        let mut store = MessageWindow::new();
        store.append_pending(Message::pending("c", "hello"));

        // an inbound message with identical text is someone else's message
        let echo = confirmed(2, "c", "hello");
        assert_eq!(store.merge_confirmed(echo, window()), MergeOutcome::Inserted);
        assert_eq!(store.pending_count(), 1);
        assert_invariant(&store);
    }

    #[test]
    fn test_prepend_dedups_and_counts() {
        let mut store = MessageWindow::new();
        store.merge_confirmed(confirmed(10, "c", "x"), window());
        store.merge_confirmed(confirmed(11, "c", "x"), window());

        let page = vec![
            confirmed(8, "c", "old"),
            confirmed(10, "c", "x"), // already delivered via the stream
            confirmed(9, "c", "old"),
        ];
        assert_eq!(store.prepend_older(page), 2);
        let ids: Vec<i64> = store.messages().iter().filter_map(|m| m.id).collect();
        assert_eq!(ids, vec![8, 9, 10, 11]);
        assert_invariant(&store);
    }

    #[test]
    fn test_prepend_is_idempotent() {
        let mut store = MessageWindow::new();
        store.merge_confirmed(confirmed(10, "c", "x"), window());

        let page = vec![confirmed(8, "c", "old"), confirmed(9, "c", "old")];
        assert_eq!(store.prepend_older(page.clone()), 2);
        // a retried request delivers the same page again
        assert_eq!(store.prepend_older(page), 0);
        assert_eq!(store.len(), 3);
        assert_invariant(&store);
    }

    #[test]
    fn test_remove_pending() {
        let mut store = MessageWindow::new();
        let pending = Message::pending("c", "oops");
        let temp_id = pending.temp_id.clone().unwrap();
        store.append_pending(pending);

        let removed = store.remove_pending(&temp_id);
        assert!(removed.is_some());
        assert!(store.is_empty());
        assert!(store.remove_pending(&temp_id).is_none());
    }

    #[test]
    fn test_replace_all_normalizes() {
        let mut store = MessageWindow::new();
        store.replace_all(vec![
            confirmed(3, "c", "c"),
            confirmed(1, "c", "a"),
            confirmed(3, "c", "c"),
            confirmed(2, "c", "b"),
        ]);
        let ids: Vec<i64> = store.messages().iter().filter_map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_tail_key_tracks_last_entry() {
        let mut store = MessageWindow::new();
        assert!(store.tail_key().is_none());
        store.merge_confirmed(confirmed(4, "c", "x"), window());
        assert_eq!(store.tail_key().as_deref(), Some("4"));

        let pending = Message::pending("c", "draft");
        let temp_id = pending.temp_id.clone().unwrap();
        store.append_pending(pending);
        assert_eq!(store.tail_key(), Some(temp_id));
        assert_eq!(store.last_confirmed_id(), Some(4));
    }
}
