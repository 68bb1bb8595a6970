//! The reel as a whole: wires the components to one event bus and one
//! task registry, and maps gestures to component calls.

use std::sync::Arc;

use tokio::{sync::broadcast, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    engagement::{EngagementController, FloatingHeart, LikeTransition},
    events::{event_channel, EventSender, ReelEvent},
    feed::{CommentFeed, FeedError},
    intro::{IntroPhase, IntroSequencer},
    playback::{MediaElement, OverlayKey, PlaybackController, PlaybackError, PlaybackState},
    share::{ShareController, ShareOutcome, SharePlatform},
    store::CommentStore,
    timers::{TaskRegistry, TimerKey},
};

/// Collaborators supplied by the host.
pub struct ReelDependencies {
    pub store: Arc<dyn CommentStore>,
    pub video: Arc<dyn MediaElement>,
    pub audio: Option<Arc<dyn MediaElement>>,
    pub share: Arc<dyn SharePlatform>,
}

/// Point-in-time view of everything a renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ReelSnapshot {
    pub phase: IntroPhase,
    pub progress: u8,
    pub playback: PlaybackState,
    pub overlay_visible: bool,
    pub liked: bool,
    pub like_count: u32,
    pub bouncing: bool,
    pub hearts: Vec<FloatingHeart>,
    pub comment_count: usize,
    pub comments_open: bool,
    pub link_copied: bool,
}

pub struct ReelsController {
    intro: Arc<IntroSequencer>,
    playback: Arc<PlaybackController>,
    engagement: Arc<EngagementController>,
    feed: Arc<CommentFeed>,
    share: Arc<ShareController>,
    events: EventSender,
    timers: Arc<TaskRegistry>,
}

impl ReelsController {
    pub fn new(settings: &Settings, deps: ReelDependencies) -> Arc<Self> {
        let events = event_channel();
        let timers = Arc::new(TaskRegistry::new());

        let intro = IntroSequencer::new(events.clone(), Arc::clone(&timers));
        let playback = Arc::new(PlaybackController::new(
            deps.video,
            deps.audio,
            events.clone(),
        ));
        let engagement =
            EngagementController::new(settings.like_seed, events.clone(), Arc::clone(&timers));
        let feed = CommentFeed::new(deps.store, events.clone(), Arc::clone(&timers));
        let share = ShareController::new(
            deps.share,
            settings.share_data(),
            settings.share_fallback,
            events.clone(),
            Arc::clone(&timers),
        );

        Arc::new(Self {
            intro,
            playback,
            engagement,
            feed,
            share,
            events,
            timers,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ReelEvent> {
        self.events.subscribe()
    }

    pub fn intro(&self) -> &Arc<IntroSequencer> {
        &self.intro
    }

    pub fn playback(&self) -> &Arc<PlaybackController> {
        &self.playback
    }

    pub fn engagement(&self) -> &Arc<EngagementController> {
        &self.engagement
    }

    pub fn feed(&self) -> &Arc<CommentFeed> {
        &self.feed
    }

    pub fn share(&self) -> &Arc<ShareController> {
        &self.share
    }

    /// Tap on the envelope. Once the intro reaches Ready the reel starts
    /// playing and the comment feed is mounted.
    pub async fn open_envelope(self: &Arc<Self>) -> bool {
        if !self.intro.open().await {
            return false;
        }
        let controller = Arc::clone(self);
        self.timers.spawn(TimerKey::Autoplay, async move {
            controller.intro.wait_until_ready().await;
            info!("reel: intro finished, starting playback");
            if let Err(err) = controller.playback.play().await {
                warn!(%err, "reel: autoplay failed, waiting for a tap");
            }
            if let Err(err) = controller.mount_feed().await {
                warn!(%err, "reel: comment feed mounted without data");
            }
        })
    }

    pub async fn mount_feed(&self) -> Result<(), FeedError> {
        self.feed.attach().await
    }

    /// Media gestures are ignored until the intro is Ready.
    fn media_ready(&self) -> bool {
        let ready = self.intro.phase() == IntroPhase::Ready;
        if !ready {
            debug!("reel: media gesture ignored before intro is ready");
        }
        ready
    }

    /// Single tap toggles playback. `None` while the intro is still running.
    pub async fn tap_surface(&self) -> Option<Result<PlaybackState, PlaybackError>> {
        if !self.media_ready() {
            return None;
        }
        Some(self.playback.toggle_play().await)
    }

    /// Double tap likes; it never pauses.
    pub async fn double_tap_surface(self: &Arc<Self>) -> LikeTransition {
        self.like().await
    }

    pub async fn like(self: &Arc<Self>) -> LikeTransition {
        self.engagement.toggle_like().await
    }

    pub async fn tap_overlay(&self) -> Option<Result<PlaybackState, PlaybackError>> {
        if !self.media_ready() {
            return None;
        }
        Some(self.playback.play().await)
    }

    /// Enter and Space on the paused overlay resume; anything else is ignored.
    pub async fn press_overlay_key(
        &self,
        key: OverlayKey,
    ) -> Option<Result<PlaybackState, PlaybackError>> {
        if !key.resumes_playback()
            || !self.media_ready()
            || !self.playback.overlay_visible().await
        {
            return None;
        }
        Some(self.playback.play().await)
    }

    pub async fn toggle_mute(&self) -> PlaybackState {
        self.playback.toggle_mute().await
    }

    pub async fn share_invitation(self: &Arc<Self>) -> ShareOutcome {
        self.share.share().await
    }

    pub async fn copy_link(self: &Arc<Self>) -> bool {
        self.share.copy_link().await
    }

    pub async fn snapshot(&self) -> ReelSnapshot {
        let intro = self.intro.state().await;
        let playback = self.playback.state().await;
        let engagement = self.engagement.state().await;
        ReelSnapshot {
            phase: intro.phase(),
            progress: intro.progress(),
            playback,
            overlay_visible: !playback.playing,
            liked: engagement.liked(),
            like_count: engagement.like_count(),
            bouncing: engagement.bouncing(),
            hearts: engagement.active_hearts(Instant::now()),
            comment_count: self.feed.count().await,
            comments_open: self.feed.panel_open().await,
            link_copied: self.share.is_copied().await,
        }
    }

    /// Cancels every pending timer and releases the comment subscription.
    /// Nothing scheduled afterwards runs.
    pub fn teardown(&self) {
        self.feed.detach();
        self.timers.cancel_all();
        info!("reel: torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.timers.is_closed()
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
