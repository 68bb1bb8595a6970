//! Comment store seam: the backend the feed talks to.

use std::cmp::Reverse;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, Stream, StreamExt};
use reel_shared::domain::{parse_timestamp, CommentId, CommentRow, NewComment};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// All rows, newest first by row-creation time.
    async fn select_all(&self) -> Result<Vec<CommentRow>>;
    async fn insert(&self, comment: NewComment) -> Result<()>;
    /// Deleting an id that no longer exists succeeds.
    async fn delete(&self, id: &CommentId) -> Result<()>;
    async fn subscribe_inserts(&self) -> Result<CommentSubscription>;
}

/// Live feed of inserted rows.
///
/// Dropping the subscription (or calling [`CommentSubscription::release`])
/// tells the store to close the underlying channel.
pub struct CommentSubscription {
    rows: BoxStream<'static, Result<CommentRow>>,
    release: Option<oneshot::Sender<()>>,
}

impl CommentSubscription {
    pub fn new<S>(rows: S, release: Option<oneshot::Sender<()>>) -> Self
    where
        S: Stream<Item = Result<CommentRow>> + Send + 'static,
    {
        Self {
            rows: rows.boxed(),
            release,
        }
    }

    pub async fn next_row(&mut self) -> Option<Result<CommentRow>> {
        self.rows.next().await
    }

    pub fn release(mut self) {
        self.signal_release();
    }

    fn signal_release(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

impl Drop for CommentSubscription {
    fn drop(&mut self) {
        self.signal_release();
    }
}

pub struct MissingCommentStore;

#[async_trait]
impl CommentStore for MissingCommentStore {
    async fn select_all(&self) -> Result<Vec<CommentRow>> {
        Err(anyhow!("comment store is not configured"))
    }

    async fn insert(&self, _comment: NewComment) -> Result<()> {
        Err(anyhow!("comment store is not configured"))
    }

    async fn delete(&self, _id: &CommentId) -> Result<()> {
        Err(anyhow!("comment store is not configured"))
    }

    async fn subscribe_inserts(&self) -> Result<CommentSubscription> {
        Err(anyhow!("comment store is not configured"))
    }
}

const INSERT_FANOUT_CAPACITY: usize = 128;

/// Process-local store with broadcast fan-out of inserts.
pub struct InMemoryCommentStore {
    rows: Mutex<Vec<CommentRow>>,
    inserts: broadcast::Sender<CommentRow>,
}

impl Default for InMemoryCommentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCommentStore {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(INSERT_FANOUT_CAPACITY);
        Self {
            rows: Mutex::new(Vec::new()),
            inserts,
        }
    }

    pub fn with_rows(rows: Vec<CommentRow>) -> Self {
        let mut store = Self::new();
        *store.rows.get_mut() = rows;
        store
    }

    /// Open realtime subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inserts.receiver_count()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

fn created_at(row: &CommentRow) -> DateTime<Utc> {
    parse_timestamp(&row.created_at).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn select_all(&self) -> Result<Vec<CommentRow>> {
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by_key(|row| Reverse(created_at(row)));
        Ok(rows)
    }

    async fn insert(&self, comment: NewComment) -> Result<()> {
        let row = CommentRow {
            id: CommentId::new(Uuid::new_v4().to_string()),
            name: comment.name,
            message: comment.message,
            timestamp: Some(comment.timestamp.to_rfc3339()),
            created_at: Utc::now().to_rfc3339(),
        };
        self.rows.lock().await.push(row.clone());
        debug!(id = %row.id, "memory store: inserted");
        let _ = self.inserts.send(row);
        Ok(())
    }

    async fn delete(&self, id: &CommentId) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| &row.id != id);
        debug!(%id, removed = before - rows.len(), "memory store: delete");
        Ok(())
    }

    async fn subscribe_inserts(&self) -> Result<CommentSubscription> {
        let rows = BroadcastStream::new(self.inserts.subscribe()).map(|item| {
            item.map_err(|err| anyhow!("realtime subscription fell behind: {err}"))
        });
        Ok(CommentSubscription::new(rows, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, created_at: &str) -> CommentRow {
        CommentRow {
            id: CommentId::from(id),
            name: "guest".into(),
            message: "hello".into(),
            timestamp: None,
            created_at: created_at.into(),
        }
    }

    #[tokio::test]
    async fn select_all_orders_newest_first() {
        let store = InMemoryCommentStore::with_rows(vec![
            row("old", "2024-01-01T08:00:00Z"),
            row("new", "2024-01-01T12:00:00Z"),
            row("mid", "2024-01-01T10:00:00+00:00"),
        ]);
        let ids: Vec<_> = store
            .select_all()
            .await
            .expect("select")
            .into_iter()
            .map(|row| row.id.0)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn inserts_fan_out_to_subscribers() {
        let store = InMemoryCommentStore::new();
        let mut subscription = store.subscribe_inserts().await.expect("subscribe");
        assert_eq!(store.subscriber_count(), 1);

        store
            .insert(NewComment {
                name: "Ana".into(),
                message: "Selamat".into(),
                timestamp: Utc::now(),
            })
            .await
            .expect("insert");

        let pushed = subscription.next_row().await.expect("row").expect("ok");
        assert_eq!(pushed.name, "Ana");
        assert!(pushed.normalize().is_ok());

        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn deleting_missing_id_is_not_an_error() {
        let store = InMemoryCommentStore::with_rows(vec![row("a", "2024-01-01T08:00:00Z")]);
        store.delete(&CommentId::from("zzz")).await.expect("noop");
        assert_eq!(store.len().await, 1);
        store.delete(&CommentId::from("a")).await.expect("delete");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn release_signal_fires_on_drop() {
        let (tx, rx) = oneshot::channel();
        let rows = futures::stream::empty::<Result<CommentRow>>();
        let subscription = CommentSubscription::new(rows, Some(tx));
        drop(subscription);
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn missing_store_fails_every_operation() {
        let store = MissingCommentStore;
        assert!(store.select_all().await.is_err());
        assert!(store.subscribe_inserts().await.is_err());
    }
}
