//! Like toggle, counter, floating hearts and the bounce flag.
//!
//! Likes are cosmetic: the counter starts from a configured seed and is
//! never persisted.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use crate::{
    events::{EventSender, Notification, ReelEvent},
    timers::{TaskRegistry, TimerKey},
};

pub const DEFAULT_LIKE_SEED: u32 = 247;
pub const HEART_LIFETIME: Duration = Duration::from_millis(1000);
pub const BOUNCE_DURATION: Duration = Duration::from_millis(600);

/// Generation timestamp in epoch milliseconds, bumped to stay unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeartId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct FloatingHeart {
    pub id: HeartId,
    /// Horizontal position, percent of viewport width.
    pub x: f32,
    /// Vertical position, percent of viewport height.
    pub y: f32,
    pub spawned_at: Instant,
}

impl FloatingHeart {
    pub fn is_active_at(&self, now: Instant) -> bool {
        now < self.spawned_at + HEART_LIFETIME
    }
}

pub fn random_heart_position<R: Rng + ?Sized>(rng: &mut R) -> (f32, f32) {
    (rng.gen_range(25.0..=75.0), rng.gen_range(40.0..=60.0))
}

#[derive(Debug, Clone, PartialEq)]
pub enum LikeTransition {
    Liked(FloatingHeart),
    Unliked,
}

#[derive(Debug, Clone)]
pub struct EngagementState {
    like_count: u32,
    liked: bool,
    bouncing: bool,
    hearts: Vec<FloatingHeart>,
    last_heart_id: u64,
}

impl EngagementState {
    pub fn new(seed: u32) -> Self {
        Self {
            like_count: seed,
            liked: false,
            bouncing: false,
            hearts: Vec::new(),
            last_heart_id: 0,
        }
    }

    pub fn like_count(&self) -> u32 {
        self.like_count
    }

    pub fn liked(&self) -> bool {
        self.liked
    }

    pub fn bouncing(&self) -> bool {
        self.bouncing
    }

    pub fn toggle_like<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: Instant,
        epoch_millis: u64,
    ) -> LikeTransition {
        if self.liked {
            self.liked = false;
            self.like_count = self.like_count.saturating_sub(1);
            return LikeTransition::Unliked;
        }

        self.liked = true;
        self.like_count += 1;
        self.bouncing = true;

        let id = HeartId(epoch_millis.max(self.last_heart_id + 1));
        self.last_heart_id = id.0;
        let (x, y) = random_heart_position(rng);
        let heart = FloatingHeart {
            id,
            x,
            y,
            spawned_at: now,
        };
        self.hearts.push(heart.clone());
        LikeTransition::Liked(heart)
    }

    /// Hearts still on screen at `now`.
    pub fn active_hearts(&self, now: Instant) -> Vec<FloatingHeart> {
        self.hearts
            .iter()
            .filter(|heart| heart.is_active_at(now))
            .cloned()
            .collect()
    }

    pub fn expire_heart(&mut self, id: HeartId) -> bool {
        let before = self.hearts.len();
        self.hearts.retain(|heart| heart.id != id);
        self.hearts.len() != before
    }

    pub fn clear_bounce(&mut self) -> bool {
        std::mem::replace(&mut self.bouncing, false)
    }
}

struct EngagementInner {
    state: EngagementState,
    rng: StdRng,
}

pub struct EngagementController {
    inner: Mutex<EngagementInner>,
    events: EventSender,
    timers: Arc<TaskRegistry>,
}

impl EngagementController {
    pub fn new(seed: u32, events: EventSender, timers: Arc<TaskRegistry>) -> Arc<Self> {
        Self::with_rng(seed, StdRng::from_entropy(), events, timers)
    }

    pub fn with_rng(
        seed: u32,
        rng: StdRng,
        events: EventSender,
        timers: Arc<TaskRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(EngagementInner {
                state: EngagementState::new(seed),
                rng,
            }),
            events,
            timers,
        })
    }

    pub async fn state(&self) -> EngagementState {
        self.inner.lock().await.state.clone()
    }

    pub async fn active_hearts(&self) -> Vec<FloatingHeart> {
        self.inner.lock().await.state.active_hearts(Instant::now())
    }

    pub async fn toggle_like(self: &Arc<Self>) -> LikeTransition {
        let epoch_millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let (transition, like_count) = {
            let mut guard = self.inner.lock().await;
            let EngagementInner { state, rng } = &mut *guard;
            let transition = state.toggle_like(rng, Instant::now(), epoch_millis);
            (transition, state.like_count())
        };

        let liked = matches!(transition, LikeTransition::Liked(_));
        info!(liked, like_count, "engagement: like toggled");
        let _ = self
            .events
            .send(ReelEvent::LikeChanged { liked, like_count });

        if let LikeTransition::Liked(heart) = &transition {
            let _ = self.events.send(ReelEvent::HeartSpawned(heart.clone()));
            let _ = self.events.send(ReelEvent::BounceChanged(true));
            let _ = self.events.send(ReelEvent::Notify(Notification::info(
                "❤️ Loved!",
                "Thank you for sharing the love!",
            )));
            self.schedule_heart_expiry(heart.id);
            self.schedule_bounce_reset();
        }

        transition
    }

    fn schedule_heart_expiry(self: &Arc<Self>, id: HeartId) {
        let controller = Arc::clone(self);
        self.timers
            .schedule(TimerKey::HeartExpiry(id), HEART_LIFETIME, async move {
                if controller.inner.lock().await.state.expire_heart(id) {
                    debug!(heart = id.0, "engagement: heart expired");
                    let _ = controller.events.send(ReelEvent::HeartExpired(id));
                }
            });
    }

    fn schedule_bounce_reset(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        self.timers
            .schedule(TimerKey::LikeBounce, BOUNCE_DURATION, async move {
                if controller.inner.lock().await.state.clear_bounce() {
                    let _ = controller.events.send(ReelEvent::BounceChanged(false));
                }
            });
    }
}

#[cfg(test)]
#[path = "tests/engagement_tests.rs"]
mod tests;
