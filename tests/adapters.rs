use chrono::Utc;
use postharvest::infra::random::MutexRng;
use postharvest::infra::system_clock::SystemClock;
use postharvest::ports::clock::Clock;
use postharvest::ports::random::RandomSource;

#[tokio::test]
async fn seeded_rng_stays_in_range_and_repeats() {
    let a = MutexRng::seeded(7);
    let b = MutexRng::seeded(7);
    for _ in 0..100 {
        let x = a.pick_index(5).await;
        assert!(x < 5);
        assert_eq!(x, b.pick_index(5).await);
    }
}

#[tokio::test]
async fn pick_index_of_one_is_zero() {
    let rng = MutexRng::new();
    for _ in 0..10 {
        assert_eq!(rng.pick_index(1).await, 0);
    }
}

#[tokio::test]
async fn system_clock_tracks_wall_time() {
    let before = Utc::now().timestamp_millis();
    let now = SystemClock.now().await.timestamp_millis();
    let after = Utc::now().timestamp_millis();
    assert!(before <= now && now <= after, "{before} <= {now} <= {after}");
}
