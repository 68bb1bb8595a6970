//! Share sheet and copy-link actions.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reel_shared::domain::ShareData;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::{
    events::{EventSender, Notification, ReelEvent},
    timers::{TaskRegistry, TimerKey},
};

pub const COPIED_RESET: Duration = Duration::from_millis(2000);
const MESSAGING_SHARE_URL: &str = "https://wa.me/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// The user dismissed the share sheet.
    #[error("share cancelled")]
    Cancelled,
    #[error("share failed: {0}")]
    Failed(String),
}

/// Host capabilities used by the share and copy affordances.
#[async_trait]
pub trait SharePlatform: Send + Sync {
    fn can_share(&self, data: &ShareData) -> bool;
    async fn share(&self, data: &ShareData) -> Result<(), ShareError>;
    async fn open_url(&self, url: &Url) -> Result<()>;
    async fn write_clipboard(&self, text: &str) -> Result<()>;
}

pub struct NoSharePlatform;

#[async_trait]
impl SharePlatform for NoSharePlatform {
    fn can_share(&self, _data: &ShareData) -> bool {
        false
    }

    async fn share(&self, _data: &ShareData) -> Result<(), ShareError> {
        Err(ShareError::Failed("share sheet is not available".into()))
    }

    async fn open_url(&self, _url: &Url) -> Result<()> {
        Err(anyhow!("no url handler is configured"))
    }

    async fn write_clipboard(&self, _text: &str) -> Result<()> {
        Err(anyhow!("clipboard is not available"))
    }
}

/// What `share` does when the platform has no share sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareFallback {
    #[default]
    Messaging,
    Clipboard,
}

impl FromStr for ShareFallback {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "messaging" | "whatsapp" => Ok(Self::Messaging),
            "clipboard" | "copy" => Ok(Self::Clipboard),
            other => Err(format!("unknown share fallback '{other}'")),
        }
    }
}

impl fmt::Display for ShareFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messaging => f.write_str("messaging"),
            Self::Clipboard => f.write_str("clipboard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Dismissed,
    OpenedMessaging(Url),
    Copied,
    Failed,
}

/// `https://wa.me/?text=<text url>` with the pair form-encoded.
pub fn messaging_fallback_url(data: &ShareData) -> Result<Url> {
    let mut url = Url::parse(MESSAGING_SHARE_URL)?;
    url.query_pairs_mut()
        .append_pair("text", &format!("{} {}", data.text, data.url));
    Ok(url)
}

pub struct ShareController {
    platform: Arc<dyn SharePlatform>,
    data: ShareData,
    fallback: ShareFallback,
    copied: Mutex<bool>,
    events: EventSender,
    timers: Arc<TaskRegistry>,
}

impl ShareController {
    pub fn new(
        platform: Arc<dyn SharePlatform>,
        data: ShareData,
        fallback: ShareFallback,
        events: EventSender,
        timers: Arc<TaskRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            platform,
            data,
            fallback,
            copied: Mutex::new(false),
            events,
            timers,
        })
    }

    pub fn data(&self) -> &ShareData {
        &self.data
    }

    pub async fn is_copied(&self) -> bool {
        *self.copied.lock().await
    }

    pub async fn share(self: &Arc<Self>) -> ShareOutcome {
        if self.platform.can_share(&self.data) {
            return match self.platform.share(&self.data).await {
                Ok(()) => {
                    info!("share: sheet completed");
                    ShareOutcome::Shared
                }
                Err(err) => {
                    info!(%err, "share: sheet dismissed");
                    ShareOutcome::Dismissed
                }
            };
        }

        match self.fallback {
            ShareFallback::Messaging => self.open_messaging().await,
            ShareFallback::Clipboard => {
                if self.copy_link().await {
                    ShareOutcome::Copied
                } else {
                    ShareOutcome::Failed
                }
            }
        }
    }

    async fn open_messaging(&self) -> ShareOutcome {
        let url = match messaging_fallback_url(&self.data) {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, "share: could not build messaging link");
                return ShareOutcome::Failed;
            }
        };
        if let Err(err) = self.platform.open_url(&url).await {
            warn!(%err, "share: messaging fallback failed");
            return ShareOutcome::Failed;
        }
        info!(%url, "share: opened messaging fallback");
        let _ = self
            .events
            .send(ReelEvent::ShareFallbackOpened(url.to_string()));
        ShareOutcome::OpenedMessaging(url)
    }

    /// Copies the invitation link. `copied` flips back after [`COPIED_RESET`].
    pub async fn copy_link(self: &Arc<Self>) -> bool {
        if let Err(err) = self.platform.write_clipboard(&self.data.url).await {
            warn!(%err, "share: clipboard write failed");
            self.notify(Notification::destructive(
                "Copy failed",
                "Please copy the link manually",
            ));
            return false;
        }

        *self.copied.lock().await = true;
        let _ = self.events.send(ReelEvent::LinkCopiedChanged(true));
        self.notify(Notification::info(
            "Link copied!",
            "Wedding invitation link copied to clipboard",
        ));

        let controller = Arc::clone(self);
        self.timers
            .schedule(TimerKey::CopiedReset, COPIED_RESET, async move {
                *controller.copied.lock().await = false;
                let _ = controller.events.send(ReelEvent::LinkCopiedChanged(false));
            });
        true
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(ReelEvent::Notify(notification));
    }
}
