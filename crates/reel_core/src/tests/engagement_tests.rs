use super::*;
use crate::events::event_channel;

fn controller(seed: u32) -> (Arc<EngagementController>, Arc<TaskRegistry>, EventSender) {
    let events = event_channel();
    let timers = Arc::new(TaskRegistry::new());
    let controller = EngagementController::with_rng(
        seed,
        StdRng::seed_from_u64(7),
        events.clone(),
        Arc::clone(&timers),
    );
    (controller, timers, events)
}

#[test]
fn counter_tracks_liked_flag_and_never_drops_below_seed() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut state = EngagementState::new(DEFAULT_LIKE_SEED);
    let now = Instant::now();

    for step in 0..25u64 {
        state.toggle_like(&mut rng, now, 1_000 + step);
        assert_eq!(
            state.like_count(),
            DEFAULT_LIKE_SEED + u32::from(state.liked())
        );
        assert!(state.like_count() >= DEFAULT_LIKE_SEED);
    }
}

#[test]
fn only_liking_spawns_hearts_within_band() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut state = EngagementState::new(0);
    let now = Instant::now();

    for step in 0..200u64 {
        match state.toggle_like(&mut rng, now, step) {
            LikeTransition::Liked(heart) => {
                assert!((25.0..=75.0).contains(&heart.x), "x = {}", heart.x);
                assert!((40.0..=60.0).contains(&heart.y), "y = {}", heart.y);
            }
            LikeTransition::Unliked => {}
        }
    }
    assert_eq!(state.active_hearts(now).len(), 100);
}

#[test]
fn heart_ids_stay_unique_within_one_millisecond() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut state = EngagementState::new(0);
    let now = Instant::now();

    let mut ids = Vec::new();
    for _ in 0..6 {
        if let LikeTransition::Liked(heart) = state.toggle_like(&mut rng, now, 5_000) {
            ids.push(heart.id);
        }
    }
    assert_eq!(ids, vec![HeartId(5_000), HeartId(5_001), HeartId(5_002)]);
}

#[tokio::test(start_paused = true)]
async fn heart_is_gone_one_second_after_spawn() {
    let (controller, _timers, _) = controller(DEFAULT_LIKE_SEED);

    let LikeTransition::Liked(heart) = controller.toggle_like().await else {
        panic!("first toggle must like");
    };
    assert_eq!(controller.active_hearts().await, vec![heart.clone()]);

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(controller.active_hearts().await.len(), 1);

    // Exactly at spawn + lifetime the heart is already inactive.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(controller.active_hearts().await.is_empty());
    assert!(!heart.is_active_at(heart.spawned_at + HEART_LIFETIME));
}

#[tokio::test(start_paused = true)]
async fn like_emits_toast_and_clears_bounce_after_600ms() {
    let (controller, _timers, events) = controller(10);
    let mut rx = events.subscribe();

    controller.toggle_like().await;
    assert!(controller.state().await.bouncing());
    assert_eq!(controller.state().await.like_count(), 11);

    tokio::time::sleep(Duration::from_millis(601)).await;
    assert!(!controller.state().await.bouncing());

    let mut toast = None;
    let mut bounce = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            ReelEvent::Notify(notification) => toast = Some(notification),
            ReelEvent::BounceChanged(flag) => bounce.push(flag),
            _ => {}
        }
    }
    let toast = toast.expect("like toast");
    assert_eq!(toast.title, "❤️ Loved!");
    assert!(!toast.is_destructive());
    assert_eq!(bounce, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn unlike_has_no_animation() {
    let (controller, _timers, events) = controller(10);
    controller.toggle_like().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut rx = events.subscribe();
    assert_eq!(controller.toggle_like().await, LikeTransition::Unliked);
    assert_eq!(controller.state().await.like_count(), 10);

    let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![ReelEvent::LikeChanged {
            liked: false,
            like_count: 10
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_pending_expiry() {
    let (controller, timers, _) = controller(0);
    controller.toggle_like().await;
    timers.cancel_all();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The timer never ran, but the active view still filters by age.
    assert!(controller.active_hearts().await.is_empty());
    assert!(controller.state().await.bouncing());
}
