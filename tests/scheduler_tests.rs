use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use stonks_tracker::engine::PriceParams;
use stonks_tracker::event::WsEvent;
use stonks_tracker::hub::BroadcastHub;
use stonks_tracker::scheduler::TickScheduler;
use stonks_tracker::status::StatusTracker;
use stonks_tracker::store::HistoryStore;
use stonks_tracker::tally::KeywordTally;

struct Harness {
    tally: Arc<KeywordTally>,
    status: Arc<StatusTracker>,
    hub: Arc<BroadcastHub>,
    store: HistoryStore,
    store_path: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let store_path =
            std::env::temp_dir().join(format!("stonks-sched-{}.sqlite", uuid::Uuid::new_v4()));
        Self {
            tally: Arc::new(KeywordTally::new()),
            status: Arc::new(StatusTracker::new(
                "STONKS",
                "STONKS DOWN",
                Duration::from_secs(2),
            )),
            hub: Arc::new(BroadcastHub::new()),
            store: HistoryStore::new(&store_path),
            store_path,
        }
    }

    fn scheduler(&self, initial_price: f64) -> TickScheduler {
        TickScheduler::new(
            Duration::from_secs(2),
            PriceParams {
                volatility: 0.1,
                floor_price: 1.0,
            },
            initial_price,
            Arc::clone(&self.tally),
            Arc::clone(&self.status),
            Arc::clone(&self.hub),
            self.store.clone(),
        )
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.store_path);
    }
}

async fn next_tick(rx: &mut tokio::sync::mpsc::Receiver<WsEvent>) -> (f64, f64, u64, u64) {
    loop {
        match rx.recv().await.expect("event stream ended") {
            WsEvent::Tick {
                price,
                change_percent,
                up_count,
                down_count,
                ..
            } => return (price, change_percent, up_count, down_count),
            _ => continue,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn ticks_fire_on_schedule_without_chat_activity() {
    let harness = Harness::new();
    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let start = tokio::time::Instant::now();
    let handle = tokio::spawn(harness.scheduler(100.0).run(shutdown_rx));

    let (price, change, up, down) = next_tick(&mut rx).await;
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!((price, change), (100.0, 0.0));
    assert_eq!((up, down), (0, 0));

    let (price, change, ..) = next_tick(&mut rx).await;
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert_eq!((price, change), (100.0, 0.0));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn votes_move_the_price_and_reset_each_window() {
    let harness = Harness::new();
    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    for _ in 0..3 {
        harness.tally.increment_up();
    }
    harness.tally.increment_down();

    tokio::spawn(harness.scheduler(100.0).run(shutdown_rx));

    // ratio (3-1)/4 = 0.5, delta 0.05
    let (price, change, up, down) = next_tick(&mut rx).await;
    assert!((price - 105.0).abs() < 1e-9);
    assert!((change - 5.0).abs() < 1e-9);
    assert_eq!((up, down), (3, 1));

    // Window was reset at the tick boundary.
    let (price, change, up, down) = next_tick(&mut rx).await;
    assert!((price - 105.0).abs() < 1e-9);
    assert_eq!(change, 0.0);
    assert_eq!((up, down), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn price_is_clamped_at_the_floor() {
    let harness = Harness::new();
    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    for _ in 0..100 {
        harness.tally.increment_down();
    }
    tokio::spawn(harness.scheduler(1.05).run(shutdown_rx));

    let (price, change, ..) = next_tick(&mut rx).await;
    assert_eq!(price, 1.0);
    assert!(change < 0.0);
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_does_not_stop_broadcast() {
    let harness = Harness::new();

    // A store rooted under a regular file cannot create its directory.
    let blocker = std::env::temp_dir().join(format!("stonks-blocker-{}", uuid::Uuid::new_v4()));
    std::fs::write(&blocker, b"x").unwrap();
    let broken_store = HistoryStore::new(blocker.join("sub").join("db.sqlite"));
    assert!(broken_store
        .append(&stonks_tracker::model::tick::PriceTick {
            timestamp: chrono::Utc::now(),
            price: 1.0,
            change_percent: 0.0,
            up_count: 0,
            down_count: 0,
        })
        .is_err());

    let scheduler = TickScheduler::new(
        Duration::from_secs(2),
        PriceParams {
            volatility: 0.1,
            floor_price: 1.0,
        },
        100.0,
        Arc::clone(&harness.tally),
        Arc::clone(&harness.status),
        Arc::clone(&harness.hub),
        broken_store,
    );

    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(scheduler.run(shutdown_rx));

    let (price, ..) = next_tick(&mut rx).await;
    assert_eq!(price, 100.0);

    let _ = std::fs::remove_file(&blocker);
}

#[tokio::test(start_paused = true)]
async fn price_series_resumes_from_history() {
    let harness = Harness::new();
    harness
        .store
        .append(&stonks_tracker::model::tick::PriceTick {
            timestamp: chrono::DateTime::from_timestamp_millis(1_000).unwrap(),
            price: 42.0,
            change_percent: 0.0,
            up_count: 0,
            down_count: 0,
        })
        .unwrap();

    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(harness.scheduler(100.0).run(shutdown_rx));

    let (price, change, ..) = next_tick(&mut rx).await;
    assert_eq!(price, 42.0);
    assert_eq!(change, 0.0);
}

#[tokio::test(start_paused = true)]
async fn next_tick_timestamp_advances_after_each_fire() {
    let harness = Harness::new();
    let before = harness.status.snapshot().next_tick_at;

    let (_id, mut rx) = harness.hub.subscribe(&harness.status.snapshot());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(harness.scheduler(100.0).run(shutdown_rx));

    let _ = next_tick(&mut rx).await;
    assert!(harness.status.snapshot().next_tick_at >= before);
}
