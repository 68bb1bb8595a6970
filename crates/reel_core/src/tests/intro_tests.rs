use super::*;
use crate::events::event_channel;

fn sequencer() -> (Arc<IntroSequencer>, Arc<TaskRegistry>) {
    let timers = Arc::new(TaskRegistry::new());
    (IntroSequencer::new(event_channel(), Arc::clone(&timers)), timers)
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[test]
fn progress_is_linear_and_capped() {
    assert_eq!(loading_progress(Duration::ZERO), 0);
    assert_eq!(loading_progress(Duration::from_millis(69)), 0);
    assert_eq!(loading_progress(Duration::from_millis(70)), 1);
    assert_eq!(loading_progress(Duration::from_millis(3500)), 50);
    assert_eq!(loading_progress(Duration::from_millis(6999)), 99);
    assert_eq!(loading_progress(Duration::from_millis(7000)), 100);
    assert_eq!(loading_progress(Duration::from_secs(60)), 100);
}

#[test]
fn state_machine_only_moves_forward() {
    let mut state = IntroState::default();
    assert!(!state.begin_loading());
    assert!(state.open());
    assert!(!state.open());
    assert!(state.begin_loading());
    assert!(!state.finish());
    assert_eq!(state.advance(Duration::from_millis(7000)), Some(100));
    assert_eq!(state.advance(Duration::from_millis(100)), None);
    assert!(state.finish());
    assert_eq!(state.phase(), IntroPhase::Ready);
    assert!(!state.open());
}

#[tokio::test(start_paused = true)]
async fn full_sequence_hits_exact_timings() {
    let (intro, _timers) = sequencer();
    assert_eq!(intro.phase(), IntroPhase::Envelope);

    assert!(intro.open().await);
    assert_eq!(intro.phase(), IntroPhase::Opening);

    sleep_ms(799).await;
    assert_eq!(intro.phase(), IntroPhase::Opening);
    sleep_ms(2).await;
    assert_eq!(intro.phase(), IntroPhase::Loading);

    // 800ms opening + 7000ms loading
    sleep_ms(7000).await;
    let state = intro.state().await;
    assert_eq!(state.progress(), 100);
    assert_eq!(state.phase(), IntroPhase::Loading);

    sleep_ms(298).await;
    assert_eq!(intro.phase(), IntroPhase::Loading);
    sleep_ms(2).await;
    assert_eq!(intro.phase(), IntroPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn asset_readiness_never_moves_the_bar() {
    let (fast, _fast_timers) = sequencer();
    let (slow, _slow_timers) = sequencer();
    fast.open().await;
    slow.open().await;

    fast.record_asset(MediaAsset::Video, AssetStatus::Ready).await;
    fast.record_asset(MediaAsset::Audio, AssetStatus::Ready).await;
    slow.record_asset(MediaAsset::Audio, AssetStatus::Failed).await;

    sleep_ms(800 + 3500 + 1).await;
    assert_eq!(fast.state().await.progress(), slow.state().await.progress());
    assert_eq!(fast.state().await.progress(), 50);

    sleep_ms(3500 + 300).await;
    assert_eq!(fast.phase(), IntroPhase::Ready);
    assert_eq!(slow.phase(), IntroPhase::Ready);
    assert_eq!(slow.state().await.asset(MediaAsset::Video), AssetStatus::Pending);
    assert_eq!(slow.state().await.asset(MediaAsset::Audio), AssetStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn progress_events_are_monotonic_and_end_at_100() {
    let events = event_channel();
    let mut rx = events.subscribe();
    let timers = Arc::new(TaskRegistry::new());
    let intro = IntroSequencer::new(events, timers);
    intro.open().await;
    intro.wait_until_ready().await;

    let mut last = 0;
    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            ReelEvent::IntroProgress(progress) => {
                assert!(progress > last);
                last = progress;
            }
            ReelEvent::IntroPhaseChanged(phase) => phases.push(phase),
            _ => {}
        }
    }
    assert_eq!(last, 100);
    assert_eq!(
        phases,
        vec![IntroPhase::Opening, IntroPhase::Loading, IntroPhase::Ready]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_sequence_never_reaches_ready() {
    let (intro, timers) = sequencer();
    intro.open().await;
    sleep_ms(2000).await;
    timers.cancel_all();
    sleep_ms(10_000).await;
    assert_eq!(intro.phase(), IntroPhase::Loading);
}
