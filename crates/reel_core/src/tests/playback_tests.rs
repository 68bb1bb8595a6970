use super::*;
use crate::events::{event_channel, NotificationVariant};

fn controller_with(
    video: SimulatedMedia,
    audio: Option<SimulatedMedia>,
) -> (
    PlaybackController,
    Arc<SimulatedMedia>,
    Option<Arc<SimulatedMedia>>,
    EventSender,
) {
    let events = event_channel();
    let video = Arc::new(video);
    let audio = audio.map(Arc::new);
    let controller = PlaybackController::new(
        video.clone(),
        audio.clone().map(|audio| audio as Arc<dyn MediaElement>),
        events.clone(),
    );
    (controller, video, audio, events)
}

#[tokio::test(start_paused = true)]
async fn toggling_alternates_playing_state() {
    let (controller, video, audio, _) = controller_with(
        SimulatedMedia::new("video"),
        Some(SimulatedMedia::new("audio")),
    );
    let audio = audio.expect("audio");
    let initial = controller.state().await.playing;

    for n in 1..=7 {
        let state = controller.toggle_play().await.expect("toggle");
        assert_eq!(state.playing, initial ^ (n % 2 == 1), "after {n} toggles");
        assert_eq!(video.is_playing(), state.playing);
        assert_eq!(audio.is_playing(), state.playing);
    }
}

#[tokio::test(start_paused = true)]
async fn video_is_forced_muted_when_audio_track_exists() {
    let (controller, video, audio, _) = controller_with(
        SimulatedMedia::new("video"),
        Some(SimulatedMedia::new("audio")),
    );
    let audio = audio.expect("audio");
    assert!(video.is_muted());
    assert!(!controller.state().await.muted);

    let state = controller.toggle_mute().await;
    assert!(state.muted);
    assert!(audio.is_muted());

    let state = controller.toggle_mute().await;
    assert!(!state.muted);
    assert!(!audio.is_muted());
    assert!(video.is_muted(), "video stays muted regardless");
}

#[tokio::test(start_paused = true)]
async fn mute_applies_to_video_without_audio_track() {
    let (controller, video, _, _) = controller_with(SimulatedMedia::new("video"), None);
    controller.toggle_mute().await;
    assert!(video.is_muted());
}

#[tokio::test(start_paused = true)]
async fn audio_is_aligned_to_video_clock_before_resuming() {
    let (controller, video, audio, _) = controller_with(
        SimulatedMedia::new("video"),
        Some(SimulatedMedia::new("audio")),
    );
    let audio = audio.expect("audio");

    controller.toggle_play().await.expect("play");
    tokio::time::sleep(Duration::from_secs(3)).await;
    controller.toggle_play().await.expect("pause");

    audio.seek(Duration::from_millis(250));
    video.seek(Duration::from_secs(5));

    controller.toggle_play().await.expect("resume");
    assert_eq!(audio.current_time(), video.current_time());
    assert_eq!(audio.current_time(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn audio_failure_falls_back_to_video_only() {
    let (controller, video, audio, events) = controller_with(
        SimulatedMedia::new("video"),
        Some(SimulatedMedia::new("audio").failing("decode error")),
    );
    let mut rx = events.subscribe();
    let audio = audio.expect("audio");

    let state = controller.toggle_play().await.expect("video only");
    assert!(state.playing);
    assert!(video.is_playing());
    assert!(!audio.is_playing());
    // combined attempt plus the sequential retry
    assert_eq!(audio.play_calls(), 2);

    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, ReelEvent::Notify(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn video_failure_reports_and_stays_paused() {
    let (controller, video, audio, events) = controller_with(
        SimulatedMedia::new("video").failing("404"),
        Some(SimulatedMedia::new("audio")),
    );
    let mut rx = events.subscribe();
    let audio = audio.expect("audio");

    let err = controller.toggle_play().await.expect_err("video must fail");
    assert!(matches!(err, PlaybackError::VideoStart(_)));
    assert!(!controller.state().await.playing);
    assert!(controller.overlay_visible().await);
    assert!(!video.is_playing());
    assert!(!audio.is_playing(), "audio must not run alone");

    let mut notified = false;
    while let Ok(event) = rx.try_recv() {
        if let ReelEvent::Notify(notification) = event {
            assert_eq!(notification.variant, NotificationVariant::Destructive);
            notified = true;
        }
    }
    assert!(notified);

    video.set_failure(None);
    assert!(controller.toggle_play().await.expect("retry by user").playing);
}

#[tokio::test(start_paused = true)]
async fn start_tolerates_either_completion_order() {
    for (video_latency, audio_latency) in [(10, 200), (200, 10)] {
        let (controller, video, audio, _) = controller_with(
            SimulatedMedia::new("video").with_start_latency(Duration::from_millis(video_latency)),
            Some(
                SimulatedMedia::new("audio")
                    .with_start_latency(Duration::from_millis(audio_latency)),
            ),
        );
        let state = controller.toggle_play().await.expect("play");
        assert!(state.playing);
        assert!(video.is_playing());
        assert!(audio.expect("audio").is_playing());
    }
}

#[tokio::test(start_paused = true)]
async fn play_is_noop_while_playing() {
    let (controller, video, _, _) = controller_with(SimulatedMedia::new("video"), None);
    controller.play().await.expect("play");
    controller.play().await.expect("play again");
    assert_eq!(video.play_calls(), 1);
    assert!(controller.state().await.playing);
}

#[test]
fn only_enter_and_space_resume_from_overlay() {
    assert!(OverlayKey::from_key_name("Enter").resumes_playback());
    assert!(OverlayKey::from_key_name(" ").resumes_playback());
    assert!(OverlayKey::from_key_name("Space").resumes_playback());
    assert!(!OverlayKey::from_key_name("Escape").resumes_playback());
    assert!(!OverlayKey::from_key_name("k").resumes_playback());
}

#[tokio::test(start_paused = true)]
async fn looping_media_wraps_position() {
    let media = SimulatedMedia::new("video").with_length(Duration::from_secs(10));
    media.play().await.expect("play");
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(media.current_time(), Duration::from_secs(2));
}
