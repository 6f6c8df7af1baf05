//! The live synchronization session.
//!
//! A [`SyncSession`] owns the conversation roster, the (at most one)
//! materialized conversation, and the push-stream subscription for it. All
//! writers (the send pipeline, the stream reconciler, the paginator) go
//! through the same state behind one lock, so interleavings at await
//! granularity can never lose updates. Late-resolving network results are
//! applied only if their conversation is still the materialized one; the
//! check is by id, never by "what is currently on screen".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, StreamEvent};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::SyncEvent;
use crate::history::PageCursor;
use crate::model::{Conversation, Message};
use crate::outbox::{Outbox, PendingSend};
use crate::reconcile;
use crate::recovery::StreamBackoff;
use crate::roster::ConversationRoster;
use crate::store::MessageWindow;
use crate::viewport::ViewportTracker;

/// The materialized conversation and its per-conversation machinery.
pub(crate) struct OpenConversation {
    pub(crate) conversation: Conversation,
    pub(crate) window: MessageWindow,
    pub(crate) cursor: PageCursor,
    pub(crate) viewport: ViewportTracker,
}

/// Everything the session mutates, behind one lock.
pub(crate) struct SessionState {
    pub(crate) roster: ConversationRoster,
    pub(crate) outbox: Outbox,
    pub(crate) open: Option<OpenConversation>,
}

/// Read-only snapshot of the materialized conversation for the detail view.
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub is_loading_more: bool,
}

/// Synchronization engine for one agent's workspace.
pub struct SyncSession {
    backend: Arc<dyn ChatBackend>,
    config: SyncConfig,
    state: Arc<RwLock<SessionState>>,
    events: mpsc::UnboundedSender<SyncEvent>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every open/close so late-resolving loads can detect they
    /// are stale.
    generation: AtomicU64,
}

impl SyncSession {
    /// Create a session over `backend`. Returns the session and the event
    /// receiver the rendering layer drains.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        config: SyncConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            backend,
            config,
            state: Arc::new(RwLock::new(SessionState {
                roster: ConversationRoster::new(),
                outbox: Outbox::new(),
                open: None,
            })),
            events,
            stream_task: Mutex::new(None),
            generation: AtomicU64::new(0),
        };
        (session, receiver)
    }

    /// Seed the conversation list (handed over by the list view's loader).
    pub async fn seed_roster(&self, conversations: Vec<Conversation>) {
        self.state.write().await.roster.replace_all(conversations);
        let _ = self.events.send(SyncEvent::RosterChanged);
    }

    /// Current conversation list, most recent first.
    pub async fn roster(&self) -> Vec<Conversation> {
        self.state.read().await.roster.entries().to_vec()
    }

    /// Snapshot of the open conversation, if any.
    pub async fn open_view(&self) -> Option<ConversationView> {
        let state = self.state.read().await;
        state.open.as_ref().map(|open| ConversationView {
            conversation: open.conversation.clone(),
            messages: open.window.messages().to_vec(),
            has_more: open.cursor.has_more(),
            is_loading_more: open.cursor.is_loading(),
        })
    }

    /// Materialize `conversation_id` and start its push stream, replacing
    /// any previously open conversation.
    pub async fn open_conversation(&self, conversation_id: &str, token: &str) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.stop_stream();

        let snapshot = match self.backend.fetch_conversation(conversation_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("failed to load conversation {conversation_id}: {e}");
                // the view shows an error state; never a stale window
                self.state.write().await.open = None;
                let _ = self.events.send(SyncEvent::LoadFailed {
                    conversation_id: conversation_id.to_string(),
                    reason: e.user_message(),
                });
                return Err(e);
            }
        };

        let follow = {
            let mut state = self.state.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("discarding stale load of conversation {conversation_id}");
                return Ok(());
            }
            let mut window = MessageWindow::new();
            window.replace_all(snapshot.messages);
            let mut viewport = ViewportTracker::new();
            let follow = viewport.follow_tail(window.tail_key());
            state.roster.clear_unread(conversation_id);
            state.open = Some(OpenConversation {
                conversation: snapshot.conversation,
                window,
                cursor: PageCursor::from_initial(snapshot.last_page),
                viewport,
            });
            follow
        };

        let _ = self.events.send(SyncEvent::ConversationLoaded {
            conversation_id: conversation_id.to_string(),
        });
        if let Some(mode) = follow {
            let _ = self.events.send(SyncEvent::FollowTail {
                conversation_id: conversation_id.to_string(),
                mode,
            });
        }
        let _ = self.events.send(SyncEvent::RosterChanged);

        self.start_stream(conversation_id.to_string(), token.to_string());
        info!("conversation {conversation_id} materialized");
        Ok(())
    }

    /// Drop the materialized conversation and stop its stream.
    pub async fn close_conversation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_stream();
        self.state.write().await.open = None;
    }

    /// Optimistically send `text` to `conversation_id`.
    ///
    /// The pending message is visible in the window and the roster before
    /// the network request is issued, so the caller may clear its input as
    /// soon as this returns. Empty (after trimming) text is a no-op. The
    /// rollback on failure is keyed by conversation and temp id and works
    /// even after the user navigated elsewhere.
    pub async fn send(&self, conversation_id: &str, text: &str) -> Result<()> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(());
        }

        let message = Message::pending(conversation_id, content);
        let temp_id = message.temp_id.clone().unwrap_or_default();

        {
            let mut state = self.state.write().await;
            if let Some(open) = state
                .open
                .as_mut()
                .filter(|o| o.conversation.id == conversation_id)
            {
                open.window.append_pending(message.clone());
                let _ = self.events.send(SyncEvent::MessageAppended {
                    conversation_id: conversation_id.to_string(),
                    message: message.clone(),
                });
                if let Some(mode) = open.viewport.follow_tail(open.window.tail_key()) {
                    let _ = self.events.send(SyncEvent::FollowTail {
                        conversation_id: conversation_id.to_string(),
                        mode,
                    });
                }
            }
            let prior = state
                .roster
                .bump(conversation_id, content, message.created_at);
            if prior.is_some() {
                let _ = self.events.send(SyncEvent::RosterChanged);
            }
            state.outbox.register(PendingSend {
                temp_id: temp_id.clone(),
                conversation_id: conversation_id.to_string(),
                content: content.to_string(),
                prior,
            });
        }

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let conversation_id = conversation_id.to_string();
        let content = content.to_string();
        tokio::spawn(async move {
            match backend.send_message(&conversation_id, &content).await {
                Ok(confirmed) => {
                    // promotion happens through the stream echo
                    debug!("send {temp_id} accepted as id {:?}", confirmed.id);
                }
                Err(e) => {
                    warn!("send {temp_id} to {conversation_id} failed: {e}");
                    let mut state = state.write().await;
                    let Some(pending) = state.outbox.settle(&temp_id) else {
                        // a stream echo beat the failure; nothing to undo
                        debug!("send {temp_id} already settled, skipping rollback");
                        return;
                    };
                    if let Some(open) = state
                        .open
                        .as_mut()
                        .filter(|o| o.conversation.id == pending.conversation_id)
                    {
                        open.window.remove_pending(&temp_id);
                    }
                    if let Some(prior) = pending.prior {
                        state.roster.restore(&pending.conversation_id, prior);
                    }
                    let _ = events.send(SyncEvent::SendFailed {
                        conversation_id: pending.conversation_id,
                        content: pending.content,
                        reason: e.user_message(),
                    });
                    let _ = events.send(SyncEvent::RosterChanged);
                }
            }
        });

        Ok(())
    }

    /// Report viewport metrics from the detail view. Crossing the top edge
    /// triggers one history fetch when more pages exist.
    pub async fn report_viewport(&self, offset: f64, scroll_height: f64) {
        let trigger = {
            let mut state = self.state.write().await;
            state.open.as_mut().and_then(|open| {
                let crossed = open.viewport.report(offset, scroll_height);
                let ready = crossed && open.cursor.has_more() && !open.cursor.is_loading();
                ready.then(|| open.conversation.id.clone())
            })
        };
        if let Some(conversation_id) = trigger {
            if let Err(e) = self.load_older(&conversation_id).await {
                debug!("scroll-triggered pagination failed: {e}");
            }
        }
    }

    /// Report the content height measured after a prepend re-layout; emits
    /// the offset that keeps the reader's anchor message in place.
    pub async fn report_reflow(&self, new_scroll_height: f64) {
        let mut state = self.state.write().await;
        if let Some(open) = state.open.as_mut() {
            let offset = open.viewport.restore_anchor(new_scroll_height);
            let _ = self.events.send(SyncEvent::RestoreScroll {
                conversation_id: open.conversation.id.clone(),
                offset,
            });
        }
    }

    /// Fetch the next page of older history for `conversation_id`.
    ///
    /// No-op when the history is exhausted or a load is already in flight.
    /// A failure leaves the cursor untouched so the next scroll retries.
    pub async fn load_older(&self, conversation_id: &str) -> Result<()> {
        let page = {
            let mut state = self.state.write().await;
            let Some(open) = state
                .open
                .as_mut()
                .filter(|o| o.conversation.id == conversation_id)
            else {
                return Err(SyncError::NotLoaded(conversation_id.to_string()));
            };
            match open.cursor.begin() {
                Some(page) => {
                    open.viewport.save_anchor();
                    page
                }
                None => return Ok(()),
            }
        };

        match self.backend.fetch_older_messages(conversation_id, page).await {
            Ok(fetched) => {
                let mut state = self.state.write().await;
                let Some(open) = state
                    .open
                    .as_mut()
                    .filter(|o| o.conversation.id == conversation_id)
                else {
                    debug!("discarding history page for {conversation_id}: no longer materialized");
                    return Ok(());
                };
                let added = open.window.prepend_older(fetched.messages);
                open.cursor.complete(page, fetched.last_page, added);
                debug!(
                    "page {page} for {conversation_id}: {added} new, has_more={}",
                    open.cursor.has_more()
                );
                if added > 0 {
                    let _ = self.events.send(SyncEvent::HistoryPrepended {
                        conversation_id: conversation_id.to_string(),
                        added,
                    });
                }
                Ok(())
            }
            Err(e) => {
                warn!("history fetch for {conversation_id} failed: {e}");
                let mut state = self.state.write().await;
                if let Some(open) = state
                    .open
                    .as_mut()
                    .filter(|o| o.conversation.id == conversation_id)
                {
                    open.cursor.fail();
                }
                let _ = self.events.send(SyncEvent::HistoryFailed {
                    conversation_id: conversation_id.to_string(),
                    reason: e.user_message(),
                });
                Err(e)
            }
        }
    }

    fn start_stream(&self, conversation_id: String, token: String) {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            run_stream(backend, state, events, config, conversation_id, token).await;
        });

        let mut guard = match self.stream_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    fn stop_stream(&self) {
        let mut guard = match self.stream_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(task) = guard.take() {
            task.abort();
        }
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

/// Pump the push stream for one conversation, reconnecting with backoff and
/// backfilling whatever arrived while the stream was down.
async fn run_stream(
    backend: Arc<dyn ChatBackend>,
    state: Arc<RwLock<SessionState>>,
    events: mpsc::UnboundedSender<SyncEvent>,
    config: SyncConfig,
    conversation_id: String,
    token: String,
) {
    let mut backoff = StreamBackoff::from_config(&config);
    let mut had_gap = false;
    loop {
        match backend.subscribe(&conversation_id, &token).await {
            Ok(mut stream) => {
                backoff.reset();
                if had_gap {
                    backfill(&backend, &state, &events, &config, &conversation_id).await;
                    let _ = events.send(SyncEvent::StreamRestored {
                        conversation_id: conversation_id.clone(),
                    });
                }
                while let Some(event) = stream.next().await {
                    let emitted = {
                        let mut state = state.write().await;
                        reconcile::apply(&mut state, event, &config)
                    };
                    for event in emitted {
                        let _ = events.send(event);
                    }
                }
                info!("push stream for {conversation_id} ended");
            }
            Err(e) => {
                warn!("subscribe for {conversation_id} failed: {e}");
            }
        }

        had_gap = true;
        let _ = events.send(SyncEvent::StreamLost {
            conversation_id: conversation_id.clone(),
        });
        match backoff.next_delay() {
            Some(delay) => {
                debug!(
                    "reconnecting stream for {conversation_id} in {:?} (attempt {})",
                    delay,
                    backoff.attempts()
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(
                    "giving up on push stream for {conversation_id} after {} attempts",
                    backoff.attempts()
                );
                return;
            }
        }
    }
}

/// Refetch the newest history page and merge anything missed while the
/// stream was down. Runs through the same reconcile path as live events, so
/// duplicates are impossible.
async fn backfill(
    backend: &Arc<dyn ChatBackend>,
    state: &Arc<RwLock<SessionState>>,
    events: &mpsc::UnboundedSender<SyncEvent>,
    config: &SyncConfig,
    conversation_id: &str,
) {
    match backend.fetch_older_messages(conversation_id, 1).await {
        Ok(page) => {
            let mut messages = page.messages;
            messages.sort_by_key(|m| m.id);
            let emitted = {
                let mut state = state.write().await;
                let mut out = Vec::new();
                for message in messages {
                    if message.id.is_none() {
                        continue;
                    }
                    out.extend(reconcile::apply(
                        &mut state,
                        StreamEvent::Message { message },
                        config,
                    ));
                }
                out
            };
            for event in emitted {
                let _ = events.send(event);
            }
        }
        Err(e) => {
            warn!("backfill for {conversation_id} failed: {e}");
        }
    }
}
