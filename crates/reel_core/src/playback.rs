//! Video/audio playback with video as the timing master.

use std::{
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{info, warn};

use crate::events::{EventSender, Notification, ReelEvent};

/// The slice of an HTML-media-like element the controller drives.
#[async_trait]
pub trait MediaElement: Send + Sync {
    async fn play(&self) -> Result<()>;
    fn pause(&self);
    fn set_muted(&self, muted: bool);
    fn is_muted(&self) -> bool;
    fn current_time(&self) -> Duration;
    fn seek(&self, position: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub playing: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Synchronized,
    VideoOnly,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("video failed to start: {0}")]
    VideoStart(String),
}

/// Keys that may land on the paused overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKey {
    Enter,
    Space,
    Other,
}

impl OverlayKey {
    pub fn from_key_name(name: &str) -> Self {
        match name {
            "Enter" => Self::Enter,
            " " | "Space" | "Spacebar" => Self::Space,
            _ => Self::Other,
        }
    }

    pub fn resumes_playback(self) -> bool {
        matches!(self, Self::Enter | Self::Space)
    }
}

pub struct PlaybackController {
    video: Arc<dyn MediaElement>,
    audio: Option<Arc<dyn MediaElement>>,
    state: Mutex<PlaybackState>,
    events: EventSender,
}

impl PlaybackController {
    /// With a separate audio track the video element is always muted.
    pub fn new(
        video: Arc<dyn MediaElement>,
        audio: Option<Arc<dyn MediaElement>>,
        events: EventSender,
    ) -> Self {
        let muted = match &audio {
            Some(audio) => {
                video.set_muted(true);
                audio.is_muted()
            }
            None => video.is_muted(),
        };
        Self {
            video,
            audio,
            state: Mutex::new(PlaybackState {
                playing: false,
                muted,
            }),
            events,
        }
    }

    pub async fn state(&self) -> PlaybackState {
        *self.state.lock().await
    }

    pub async fn overlay_visible(&self) -> bool {
        !self.state.lock().await.playing
    }

    pub fn has_audio_track(&self) -> bool {
        self.audio.is_some()
    }

    pub async fn toggle_play(&self) -> Result<PlaybackState, PlaybackError> {
        let mut state = self.state.lock().await;
        if state.playing {
            self.video.pause();
            if let Some(audio) = &self.audio {
                audio.pause();
            }
            state.playing = false;
            info!("playback: paused");
            let _ = self.events.send(ReelEvent::PlaybackChanged(*state));
            return Ok(*state);
        }

        match self.start_streams().await {
            Ok(outcome) => {
                state.playing = true;
                info!(?outcome, "playback: playing");
                let _ = self.events.send(ReelEvent::PlaybackChanged(*state));
                Ok(*state)
            }
            Err(err) => {
                warn!(%err, "playback: start failed");
                let _ = self.events.send(ReelEvent::Notify(Notification::destructive(
                    "Playback failed",
                    "The video could not be started. Tap to try again.",
                )));
                Err(err)
            }
        }
    }

    /// Starts playback unless it is already running.
    pub async fn play(&self) -> Result<PlaybackState, PlaybackError> {
        let state = self.state().await;
        if state.playing {
            return Ok(state);
        }
        self.toggle_play().await
    }

    pub async fn toggle_mute(&self) -> PlaybackState {
        let mut state = self.state.lock().await;
        state.muted = !state.muted;
        match &self.audio {
            Some(audio) => audio.set_muted(state.muted),
            None => self.video.set_muted(state.muted),
        }
        info!(muted = state.muted, "playback: mute toggled");
        let _ = self.events.send(ReelEvent::PlaybackChanged(*state));
        *state
    }

    async fn start_streams(&self) -> Result<StartOutcome, PlaybackError> {
        let Some(audio) = &self.audio else {
            self.video
                .play()
                .await
                .map_err(|err| PlaybackError::VideoStart(err.to_string()))?;
            return Ok(StartOutcome::VideoOnly);
        };

        audio.seek(self.video.current_time());
        if futures::future::try_join(self.video.play(), audio.play())
            .await
            .is_ok()
        {
            return Ok(StartOutcome::Synchronized);
        }

        warn!("playback: combined start failed, retrying video then audio");
        if let Err(err) = self.video.play().await {
            audio.pause();
            return Err(PlaybackError::VideoStart(err.to_string()));
        }

        audio.seek(self.video.current_time());
        match audio.play().await {
            Ok(()) => Ok(StartOutcome::Synchronized),
            Err(err) => {
                warn!(%err, "playback: audio unavailable, continuing video only");
                Ok(StartOutcome::VideoOnly)
            }
        }
    }
}

struct SimulatedState {
    offset: Duration,
    playing_since: Option<Instant>,
    muted: bool,
    failure: Option<String>,
    play_calls: usize,
    pause_calls: usize,
}

/// A clock-driven stand-in for a media element.
///
/// Position advances with the tokio clock while playing and wraps at
/// `length` when one is set, like a looping video.
pub struct SimulatedMedia {
    label: String,
    length: Option<Duration>,
    start_latency: Duration,
    state: StdMutex<SimulatedState>,
}

impl SimulatedMedia {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            length: None,
            start_latency: Duration::ZERO,
            state: StdMutex::new(SimulatedState {
                offset: Duration::ZERO,
                playing_since: None,
                muted: false,
                failure: None,
                play_calls: 0,
                pause_calls: 0,
            }),
        }
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_start_latency(mut self, latency: Duration) -> Self {
        self.start_latency = latency;
        self
    }

    pub fn failing(self, reason: impl Into<String>) -> Self {
        self.set_failure(Some(reason.into()));
        self
    }

    pub fn set_failure(&self, reason: Option<String>) {
        self.lock().failure = reason;
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing_since.is_some()
    }

    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.lock().pause_calls
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wrap(&self, position: Duration) -> Duration {
        match self.length {
            Some(length) if !length.is_zero() => {
                let nanos = position.as_nanos() % length.as_nanos();
                Duration::from_nanos(u64::try_from(nanos).unwrap_or_default())
            }
            _ => position,
        }
    }
}

#[async_trait]
impl MediaElement for SimulatedMedia {
    async fn play(&self) -> Result<()> {
        if !self.start_latency.is_zero() {
            tokio::time::sleep(self.start_latency).await;
        }
        let mut state = self.lock();
        state.play_calls += 1;
        if let Some(reason) = &state.failure {
            return Err(anyhow!("{} failed to play: {reason}", self.label));
        }
        if state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.pause_calls += 1;
        if let Some(since) = state.playing_since.take() {
            state.offset += since.elapsed();
        }
    }

    fn set_muted(&self, muted: bool) {
        self.lock().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn current_time(&self) -> Duration {
        let state = self.lock();
        let running = state
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        self.wrap(state.offset + running)
    }

    fn seek(&self, position: Duration) {
        let mut state = self.lock();
        state.offset = self.wrap(position);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
    }
}

#[cfg(test)]
#[path = "tests/playback_tests.rs"]
mod tests;
