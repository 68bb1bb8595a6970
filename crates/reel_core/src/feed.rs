//! Comment feed: snapshot, realtime append, submit, swipe-to-delete.
//!
//! Submitting never inserts locally; the row shows up when the realtime
//! subscription echoes it back. Failed backend calls leave local state as it
//! was and surface a destructive notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reel_shared::domain::{Comment, CommentId, NewComment};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    events::{EventSender, Notification, ReelEvent},
    store::{CommentStore, CommentSubscription},
    swipe::{SwipeOutcome, SwipeTracker, TouchPoint},
    time_ago::format_time_ago,
    timers::{TaskRegistry, TimerKey},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("failed to load comments: {0}")]
    Fetch(String),
    #[error("failed to subscribe to new comments: {0}")]
    Subscribe(String),
    #[error("failed to submit comment: {0}")]
    Submit(String),
    #[error("failed to delete comment {id}: {reason}")]
    Delete { id: CommentId, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentDraft {
    pub name: String,
    pub message: String,
}

impl CommentDraft {
    /// Both fields need visible content.
    pub fn can_submit(&self) -> bool {
        !self.name.trim().is_empty() && !self.message.trim().is_empty()
    }

    fn to_new_comment(&self, now: DateTime<Utc>) -> Option<NewComment> {
        if !self.can_submit() {
            return None;
        }
        Some(NewComment {
            name: self.name.trim().to_string(),
            message: self.message.trim().to_string(),
            timestamp: now,
        })
    }
}

/// A row ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub comment: Comment,
    pub time_ago: String,
    pub revealed: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    comments: Vec<Comment>,
    draft: CommentDraft,
    swipe: SwipeTracker,
    panel_open: bool,
    /// Realtime rows received while a snapshot fetch is in flight.
    pushed_during_fetch: Option<Vec<Comment>>,
}

impl FeedState {
    fn prepend(&mut self, comment: Comment) -> bool {
        if self.comments.iter().any(|existing| existing.id == comment.id) {
            return false;
        }
        self.comments.insert(0, comment);
        true
    }

    fn remove(&mut self, id: &CommentId) -> bool {
        let before = self.comments.len();
        self.comments.retain(|comment| &comment.id != id);
        self.comments.len() != before
    }
}

pub struct CommentFeed {
    store: Arc<dyn CommentStore>,
    state: Mutex<FeedState>,
    events: EventSender,
    timers: Arc<TaskRegistry>,
}

impl CommentFeed {
    pub fn new(
        store: Arc<dyn CommentStore>,
        events: EventSender,
        timers: Arc<TaskRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: Mutex::new(FeedState::default()),
            events,
            timers,
        })
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.state.lock().await.comments.clone()
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    pub async fn views(&self, now: DateTime<Utc>) -> Vec<CommentView> {
        let state = self.state.lock().await;
        let revealed = state.swipe.revealed();
        state
            .comments
            .iter()
            .map(|comment| CommentView {
                comment: comment.clone(),
                time_ago: format_time_ago(comment.timestamp, now),
                revealed: revealed == Some(&comment.id),
            })
            .collect()
    }

    pub fn is_subscribed(&self) -> bool {
        self.timers.is_pending(TimerKey::CommentStream)
    }

    /// Mount: open the realtime channel, then load the snapshot.
    ///
    /// Subscribing first means rows committed while the snapshot is in
    /// flight are not lost. Duplicates are dropped by id.
    pub async fn attach(self: &Arc<Self>) -> Result<(), FeedError> {
        self.subscribe_to_inserts().await?;
        self.fetch_snapshot().await.map(|_| ())
    }

    /// Teardown: stop the stream task and release the channel.
    pub fn detach(&self) {
        if self.timers.cancel(TimerKey::CommentStream) {
            info!("comments: realtime subscription released");
        }
    }

    /// Replaces the list with the store's rows. Rows pushed by the realtime
    /// stream while the fetch was in flight are merged back in by id.
    pub async fn fetch_snapshot(&self) -> Result<usize, FeedError> {
        {
            let mut state = self.state.lock().await;
            if state.pushed_during_fetch.is_none() {
                state.pushed_during_fetch = Some(Vec::new());
            }
        }

        let rows = match self.store.select_all().await {
            Ok(rows) => rows,
            Err(err) => {
                self.state.lock().await.pushed_during_fetch = None;
                error!(%err, "comments: snapshot fetch failed");
                self.notify(Notification::destructive(
                    "Error",
                    "Failed to load comments",
                ));
                return Err(FeedError::Fetch(err.to_string()));
            }
        };

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.normalize() {
                Ok(comment) => comments.push(comment),
                Err(err) => warn!(%id, %err, "comments: skipping snapshot row"),
            }
        }

        let (count, merged) = {
            let mut state = self.state.lock().await;
            let pushed = state.pushed_during_fetch.take().unwrap_or_default();
            let mut merged = 0;
            for comment in pushed {
                if !comments.iter().any(|existing| existing.id == comment.id) {
                    comments.push(comment);
                    merged += 1;
                }
            }
            comments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            state.comments = comments;
            (state.comments.len(), merged)
        };
        info!(count, merged, "comments: snapshot loaded");
        let _ = self.events.send(ReelEvent::CommentsUpdated { count });
        Ok(count)
    }

    pub async fn subscribe_to_inserts(self: &Arc<Self>) -> Result<(), FeedError> {
        let subscription = match self.store.subscribe_inserts().await {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(%err, "comments: realtime subscribe failed");
                self.notify(Notification::destructive(
                    "Error",
                    "Live comments are unavailable",
                ));
                return Err(FeedError::Subscribe(err.to_string()));
            }
        };

        let feed = Arc::clone(self);
        if !self.timers.spawn(TimerKey::CommentStream, async move {
            feed.pump(subscription).await;
        }) {
            debug!("comments: view already torn down, subscription dropped");
        }
        Ok(())
    }

    async fn pump(&self, mut subscription: CommentSubscription) {
        while let Some(item) = subscription.next_row().await {
            let row = match item {
                Ok(row) => row,
                Err(err) => {
                    error!(%err, "comments: realtime stream failed");
                    self.notify(Notification::destructive(
                        "Error",
                        "Live comments stopped updating",
                    ));
                    break;
                }
            };
            let id = row.id.clone();
            match row.normalize() {
                Ok(comment) => self.apply_insert(comment).await,
                Err(err) => warn!(%id, %err, "comments: skipping realtime row"),
            }
        }
        subscription.release();
        let _ = self.events.send(ReelEvent::CommentStreamClosed);
    }

    async fn apply_insert(&self, comment: Comment) {
        let id = comment.id.clone();
        let count = {
            let mut state = self.state.lock().await;
            if let Some(pushed) = state.pushed_during_fetch.as_mut() {
                if !pushed.iter().any(|existing| existing.id == comment.id) {
                    pushed.push(comment.clone());
                }
            }
            if !state.prepend(comment) {
                debug!(%id, "comments: duplicate realtime row ignored");
                return;
            }
            state.comments.len()
        };
        debug!(%id, count, "comments: realtime row prepended");
        let _ = self.events.send(ReelEvent::CommentsUpdated { count });
    }

    pub async fn draft(&self) -> CommentDraft {
        self.state.lock().await.draft.clone()
    }

    pub async fn set_name(&self, name: impl Into<String>) {
        self.state.lock().await.draft.name = name.into();
    }

    pub async fn set_message(&self, message: impl Into<String>) {
        self.state.lock().await.draft.message = message.into();
    }

    /// Whether the send affordance is enabled.
    pub async fn can_submit(&self) -> bool {
        self.state.lock().await.draft.can_submit()
    }

    /// Sends the draft. Returns `Ok(false)` without contacting the store when
    /// a field is blank.
    pub async fn submit_comment(&self) -> Result<bool, FeedError> {
        let Some(comment) = self.state.lock().await.draft.to_new_comment(Utc::now()) else {
            debug!("comments: submit ignored, draft incomplete");
            return Ok(false);
        };

        if let Err(err) = self.store.insert(comment).await {
            error!(%err, "comments: insert failed");
            self.notify(Notification::destructive(
                "Error",
                "Failed to add comment. Please try again.",
            ));
            return Err(FeedError::Submit(err.to_string()));
        }

        self.state.lock().await.draft = CommentDraft::default();
        info!("comments: submitted");
        let _ = self.events.send(ReelEvent::DraftCleared);
        self.notify(Notification::info(
            "💬 Comment Added!",
            "Thank you for your congratulations!",
        ));
        Ok(true)
    }

    /// Returns whether a local row was removed.
    pub async fn delete_comment(&self, id: &CommentId) -> Result<bool, FeedError> {
        if let Err(err) = self.store.delete(id).await {
            error!(%id, %err, "comments: delete failed");
            self.notify(Notification::destructive(
                "Error",
                "Failed to delete comment",
            ));
            return Err(FeedError::Delete {
                id: id.clone(),
                reason: err.to_string(),
            });
        }

        let (removed, count, was_revealed) = {
            let mut state = self.state.lock().await;
            let removed = state.remove(id);
            let was_revealed = state.swipe.hide().is_some();
            state.swipe.forget(id);
            (removed, state.comments.len(), was_revealed)
        };
        info!(%id, removed, "comments: deleted");
        if was_revealed {
            let _ = self.events.send(ReelEvent::RevealChanged(None));
        }
        if removed {
            let _ = self.events.send(ReelEvent::CommentsUpdated { count });
        }
        Ok(removed)
    }

    pub async fn touch_start(&self, id: &CommentId, at: TouchPoint) {
        self.state.lock().await.swipe.touch_start(id, at);
    }

    pub async fn touch_end(&self, id: &CommentId, at: TouchPoint) -> SwipeOutcome {
        let outcome = self.state.lock().await.swipe.touch_end(id, at);
        match &outcome {
            SwipeOutcome::Revealed(id) => {
                let _ = self
                    .events
                    .send(ReelEvent::RevealChanged(Some(id.clone())));
            }
            SwipeOutcome::Hidden(_) => {
                let _ = self.events.send(ReelEvent::RevealChanged(None));
            }
            SwipeOutcome::Ignored => {}
        }
        outcome
    }

    pub async fn revealed(&self) -> Option<CommentId> {
        self.state.lock().await.swipe.revealed().cloned()
    }

    pub async fn panel_open(&self) -> bool {
        self.state.lock().await.panel_open
    }

    pub async fn set_panel_open(&self, open: bool) {
        let changed = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut state.panel_open, open) != open
        };
        if changed {
            let _ = self.events.send(ReelEvent::CommentsPanelChanged(open));
        }
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(ReelEvent::Notify(notification));
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
