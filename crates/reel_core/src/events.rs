//! Events published by the reel components for whatever front-end renders them.

use reel_shared::domain::CommentId;
use tokio::sync::broadcast;

use crate::{
    engagement::{FloatingHeart, HeartId},
    intro::{AssetStatus, IntroPhase, MediaAsset},
    playback::PlaybackState,
};

pub const EVENT_CAPACITY: usize = 256;

pub type EventSender = broadcast::Sender<ReelEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// A transient toast. Presentation belongs to the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }

    pub fn is_destructive(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReelEvent {
    IntroPhaseChanged(IntroPhase),
    IntroProgress(u8),
    AssetStatusChanged {
        asset: MediaAsset,
        status: AssetStatus,
    },
    PlaybackChanged(PlaybackState),
    LikeChanged {
        liked: bool,
        like_count: u32,
    },
    HeartSpawned(FloatingHeart),
    HeartExpired(HeartId),
    BounceChanged(bool),
    CommentsUpdated {
        count: usize,
    },
    CommentsPanelChanged(bool),
    DraftCleared,
    RevealChanged(Option<CommentId>),
    CommentStreamClosed,
    LinkCopiedChanged(bool),
    ShareFallbackOpened(String),
    Notify(Notification),
}

pub fn event_channel() -> EventSender {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    events
}
