//! Chatdesk conversation synchronization engine.
//!
//! Keeps a single open conversation's message window, the conversation
//! list's ordering, and outgoing message state consistent across three
//! racing sources of truth: optimistic local sends, the server push stream,
//! and backward history pagination. The engine guarantees that no confirmed
//! message is ever duplicated or dropped, that confirmed messages always
//! ascend by id with pending sends at the tail, and that prepending history
//! never moves the message the reader is looking at.
//!
//! The embedding application implements [`ChatBackend`] over its transport,
//! constructs a [`SyncSession`], and drains [`SyncEvent`]s into its widget
//! tree.

pub mod backend;
pub mod config;
pub mod events;
pub mod history;
pub mod model;
pub mod outbox;
pub mod recovery;
pub mod roster;
pub mod session;
pub mod store;
pub mod viewport;

mod error;
mod reconcile;

pub use backend::{ChatBackend, EventStream, StreamEvent};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use events::SyncEvent;
pub use history::PageCursor;
pub use model::{
    Conversation, ConversationSnapshot, DeliveryState, Direction, HistoryPage, Message, Priority,
};
pub use outbox::{Outbox, PendingSend};
pub use recovery::StreamBackoff;
pub use roster::{ConversationRoster, PreviewSnapshot};
pub use session::{ConversationView, SyncSession};
pub use store::{MergeOutcome, MessageWindow};
pub use viewport::{FollowMode, ViewportTracker};
