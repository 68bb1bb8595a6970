//! Envelope → opening → loading → ready sequence that gates the player.
//!
//! Loading progress is a fixed-length animation: it reaches 100 after
//! [`LOADING_DURATION`] no matter how fast the media assets actually load.
//! Asset readiness is recorded next to it but never shortens or extends it.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    events::{EventSender, ReelEvent},
    timers::{TaskRegistry, TimerKey},
};

pub const OPENING_DURATION: Duration = Duration::from_millis(800);
pub const LOADING_DURATION: Duration = Duration::from_millis(7000);
pub const READY_DELAY: Duration = Duration::from_millis(300);
pub const PROGRESS_TICK: Duration = Duration::from_millis(70);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroPhase {
    Envelope,
    Opening,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaAsset {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetStatus {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// Percentage of the loading animation shown after `elapsed` of loading.
pub fn loading_progress(elapsed: Duration) -> u8 {
    let percent = elapsed.as_millis().saturating_mul(100) / LOADING_DURATION.as_millis();
    u8::try_from(percent.min(100)).unwrap_or(100)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntroState {
    phase: IntroPhase,
    progress: u8,
    video: AssetStatus,
    audio: AssetStatus,
}

impl Default for IntroState {
    fn default() -> Self {
        Self {
            phase: IntroPhase::Envelope,
            progress: 0,
            video: AssetStatus::Pending,
            audio: AssetStatus::Pending,
        }
    }
}

impl IntroState {
    pub fn phase(&self) -> IntroPhase {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn asset(&self, asset: MediaAsset) -> AssetStatus {
        match asset {
            MediaAsset::Video => self.video,
            MediaAsset::Audio => self.audio,
        }
    }

    pub fn open(&mut self) -> bool {
        if self.phase != IntroPhase::Envelope {
            return false;
        }
        self.phase = IntroPhase::Opening;
        true
    }

    pub fn begin_loading(&mut self) -> bool {
        if self.phase != IntroPhase::Opening {
            return false;
        }
        self.phase = IntroPhase::Loading;
        self.progress = 0;
        true
    }

    /// Moves the bar forward; returns the new value when it changed.
    pub fn advance(&mut self, elapsed: Duration) -> Option<u8> {
        if self.phase != IntroPhase::Loading {
            return None;
        }
        let progress = loading_progress(elapsed).max(self.progress);
        if progress == self.progress {
            return None;
        }
        self.progress = progress;
        Some(progress)
    }

    pub fn finish(&mut self) -> bool {
        if self.phase != IntroPhase::Loading || self.progress < 100 {
            return false;
        }
        self.phase = IntroPhase::Ready;
        true
    }

    pub fn record_asset(&mut self, asset: MediaAsset, status: AssetStatus) -> bool {
        let slot = match asset {
            MediaAsset::Video => &mut self.video,
            MediaAsset::Audio => &mut self.audio,
        };
        if *slot == status {
            return false;
        }
        *slot = status;
        true
    }
}

pub struct IntroSequencer {
    state: Mutex<IntroState>,
    phase: watch::Sender<IntroPhase>,
    events: EventSender,
    timers: Arc<TaskRegistry>,
}

impl IntroSequencer {
    pub fn new(events: EventSender, timers: Arc<TaskRegistry>) -> Arc<Self> {
        let (phase, _) = watch::channel(IntroPhase::Envelope);
        Arc::new(Self {
            state: Mutex::new(IntroState::default()),
            phase,
            events,
            timers,
        })
    }

    pub async fn state(&self) -> IntroState {
        self.state.lock().await.clone()
    }

    pub fn phase(&self) -> IntroPhase {
        *self.phase.borrow()
    }

    /// Resolves once the sequence reaches [`IntroPhase::Ready`].
    pub async fn wait_until_ready(&self) {
        let mut phase = self.phase.subscribe();
        let _ = phase.wait_for(|phase| *phase == IntroPhase::Ready).await;
    }

    /// Tap on the envelope. Ignored outside [`IntroPhase::Envelope`].
    pub async fn open(self: &Arc<Self>) -> bool {
        if !self.state.lock().await.open() {
            debug!("intro: tap ignored outside envelope");
            return false;
        }
        self.publish_phase(IntroPhase::Opening);

        let sequencer = Arc::clone(self);
        self.timers.spawn(TimerKey::IntroSequence, async move {
            sequencer.run().await;
        })
    }

    pub async fn record_asset(&self, asset: MediaAsset, status: AssetStatus) {
        if self.state.lock().await.record_asset(asset, status) {
            debug!(?asset, ?status, "intro: asset status changed");
            let _ = self
                .events
                .send(ReelEvent::AssetStatusChanged { asset, status });
        }
    }

    async fn run(&self) {
        tokio::time::sleep(OPENING_DURATION).await;
        if !self.state.lock().await.begin_loading() {
            return;
        }
        self.publish_phase(IntroPhase::Loading);

        let started = Instant::now();
        let mut ticker = interval(PROGRESS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let advanced = self.state.lock().await.advance(started.elapsed());
            if let Some(progress) = advanced {
                let _ = self.events.send(ReelEvent::IntroProgress(progress));
                if progress == 100 {
                    break;
                }
            }
        }

        tokio::time::sleep(READY_DELAY).await;
        let (finished, video, audio) = {
            let mut state = self.state.lock().await;
            (
                state.finish(),
                state.asset(MediaAsset::Video),
                state.asset(MediaAsset::Audio),
            )
        };
        if finished {
            info!(?video, ?audio, "intro: ready");
            self.publish_phase(IntroPhase::Ready);
        }
    }

    fn publish_phase(&self, phase: IntroPhase) {
        debug!(?phase, "intro: phase changed");
        self.phase.send_replace(phase);
        let _ = self.events.send(ReelEvent::IntroPhaseChanged(phase));
    }
}

#[cfg(test)]
#[path = "tests/intro_tests.rs"]
mod tests;
