//! Hosted comment store: PostgREST-style REST for CRUD plus a Phoenix-style
//! realtime websocket for insert notifications.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use reel_shared::{
    domain::{CommentId, CommentRow, NewComment},
    error::{ApiException, ErrorCode},
    protocol::{table_topic, RealtimeFrame, EVENT_REPLY},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    time::{interval_at, Instant},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::Settings,
    store::{CommentStore, CommentSubscription},
};

pub const DEFAULT_SCHEMA: &str = "public";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const ROW_BUFFER: usize = 64;

pub struct RestCommentStore {
    http: Client,
    base_url: Url,
    api_key: String,
    schema: String,
    table: String,
    heartbeat_interval: Duration,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl RestCommentStore {
    pub fn new(base_url: &str, api_key: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid store url: {base_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!("store url must start with http:// or https://"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .store_url
            .as_deref()
            .ok_or_else(|| anyhow!("store_url is not configured"))?;
        let api_key = settings.store_api_key.clone().unwrap_or_default();
        Self::new(base_url, api_key, settings.comments_table.clone())
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn rest_url(&self) -> Result<Url> {
        self.base_url
            .join(&format!("rest/v1/{}", self.table))
            .context("failed to build rest url")
    }

    fn realtime_url(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join("realtime/v1/websocket")
            .context("failed to build realtime url")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot switch {url} to {scheme}"))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Turns a non-2xx response into an [`ApiException`], keeping the backend's
/// `message` when it sends one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.to_string());
    Err(ApiException::new(ErrorCode::from_status(status.as_u16()), message).into())
}

async fn send_frame<S>(sink: &mut S, frame: &RealtimeFrame) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

fn reply_error(frame: &RealtimeFrame, topic: &str) -> Option<String> {
    if frame.event != EVENT_REPLY || frame.topic != topic {
        return None;
    }
    if frame.payload.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    Some(frame.payload["response"].to_string())
}

#[async_trait]
impl CommentStore for RestCommentStore {
    async fn select_all(&self) -> Result<Vec<CommentRow>> {
        let mut url = self.rest_url()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        let response = self.authorized(self.http.get(url)).send().await?;
        let rows = check(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, comment: NewComment) -> Result<()> {
        let response = self
            .authorized(self.http.post(self.rest_url()?))
            .header("Prefer", "return=minimal")
            .json(&comment)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &CommentId) -> Result<()> {
        let mut url = self.rest_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"));
        let response = self.authorized(self.http.delete(url)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn subscribe_inserts(&self) -> Result<CommentSubscription> {
        let url = self.realtime_url()?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect realtime websocket: {url}"))?;
        let (mut writer, mut reader) = ws_stream.split();

        let topic = table_topic(&self.schema, &self.table);
        send_frame(&mut writer, &RealtimeFrame::join(&self.schema, &self.table, "1")).await?;
        info!(%topic, "realtime: joined");

        let (rows_tx, rows_rx) = mpsc::channel::<Result<CommentRow>>(ROW_BUFFER);
        let (release_tx, mut release_rx) = oneshot::channel::<()>();
        let every = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut heartbeat = interval_at(Instant::now() + every, every);
            let mut next_ref: u64 = 2;
            loop {
                tokio::select! {
                    _ = &mut release_rx => {
                        let leave = RealtimeFrame::leave(topic.clone(), next_ref.to_string());
                        if let Err(err) = send_frame(&mut writer, &leave).await {
                            debug!(%err, "realtime: leave not delivered");
                        }
                        let _ = writer.close().await;
                        info!(%topic, "realtime: left");
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let frame = RealtimeFrame::heartbeat(next_ref.to_string());
                        next_ref += 1;
                        if let Err(err) = send_frame(&mut writer, &frame).await {
                            let _ = rows_tx.send(Err(err.context("realtime heartbeat failed"))).await;
                            break;
                        }
                    }
                    message = reader.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let frame = match serde_json::from_str::<RealtimeFrame>(&text) {
                                Ok(frame) => frame,
                                Err(err) => {
                                    warn!(%err, "realtime: unreadable frame");
                                    continue;
                                }
                            };
                            if let Some(reason) = reply_error(&frame, &topic) {
                                let _ = rows_tx.send(Err(anyhow!("realtime join rejected: {reason}"))).await;
                                break;
                            }
                            match frame.insert_record() {
                                Some(Ok(row)) => {
                                    if rows_tx.send(Ok(row)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Err(err)) => warn!(%err, "realtime: malformed insert record"),
                                None => debug!(event = %frame.event, "realtime: frame ignored"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = rows_tx.send(Err(anyhow!("realtime connection closed"))).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            let _ = rows_tx.send(Err(anyhow!("realtime connection failed: {err}"))).await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(CommentSubscription::new(
            ReceiverStream::new(rows_rx),
            Some(release_tx),
        ))
    }
}

#[cfg(test)]
#[path = "tests/rest_store_tests.rs"]
mod tests;
