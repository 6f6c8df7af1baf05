//! Scroll anchoring for the conversation detail view.
//!
//! The engine owns no widget tree. The rendering layer reports viewport
//! metrics (scroll offset from the top and total content height, in pixels)
//! and applies the scroll commands the session emits back. This module is
//! the bookkeeping in between:
//!
//! - prepending older history keeps the message under the reader's eye in
//!   place (offset grows by the content-height delta, measured after the
//!   re-layout);
//! - a new tail follows to the bottom, instantly on first materialization
//!   and smoothly afterwards;
//! - reaching the top edge fires exactly one history fetch per visit.

/// How the view should move to the bottom after an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// First materialization of a conversation: snap without animation.
    Jump,
    /// Live arrival on an already-open conversation.
    Smooth,
}

/// Scroll state for the materialized conversation.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    offset: f64,
    scroll_height: f64,
    saved_height: Option<f64>,
    last_tail: Option<String>,
    at_top: bool,
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self {
            offset: 0.0,
            scroll_height: 0.0,
            saved_height: None,
            last_tail: None,
            // armed only after the view leaves the top, so the transient
            // offset reported before the first jump-to-bottom cannot fire a
            // fetch
            at_top: true,
        }
    }

    /// Forget everything; used when the open conversation changes.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Record metrics reported by the view. Returns `true` when this report
    /// crossed the top edge (offset reached zero from above).
    pub fn report(&mut self, offset: f64, scroll_height: f64) -> bool {
        self.scroll_height = scroll_height;
        self.offset = offset;
        let crossed = offset <= 0.0 && !self.at_top;
        self.at_top = offset <= 0.0;
        crossed
    }

    /// Capture the content height before older history is prepended.
    pub fn save_anchor(&mut self) {
        self.saved_height = Some(self.scroll_height);
    }

    /// Offset that keeps the anchored message in place. Must be called with
    /// the height measured after the view re-laid out the prepended rows.
    pub fn restore_anchor(&mut self, new_scroll_height: f64) -> f64 {
        let old = self.saved_height.take().unwrap_or(self.scroll_height);
        let delta = (new_scroll_height - old).max(0.0);
        self.scroll_height = new_scroll_height;
        self.offset += delta;
        self.at_top = self.offset <= 0.0;
        self.offset
    }

    /// Decide whether an append should move the view. `None` when the tail
    /// is unchanged (duplicate delivery, prepend, roster-only event).
    pub fn follow_tail(&mut self, tail_key: Option<String>) -> Option<FollowMode> {
        let tail = tail_key?;
        if self.last_tail.as_deref() == Some(tail.as_str()) {
            return None;
        }
        let mode = if self.last_tail.is_none() {
            FollowMode::Jump
        } else {
            FollowMode::Smooth
        };
        self.last_tail = Some(tail);
        Some(mode)
    }
}
