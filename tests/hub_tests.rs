use chrono::Utc;
use std::time::Duration;

use stonks_tracker::event::WsEvent;
use stonks_tracker::hub::BroadcastHub;
use stonks_tracker::model::tick::PriceTick;
use stonks_tracker::status::StatusTracker;

fn sample_status() -> StatusTracker {
    StatusTracker::new("STONKS", "STONKS DOWN", Duration::from_secs(30))
}

fn sample_tick(price: f64) -> PriceTick {
    PriceTick {
        timestamp: Utc::now(),
        price,
        change_percent: 0.0,
        up_count: 0,
        down_count: 0,
    }
}

#[tokio::test]
async fn joiner_receives_snapshot_before_live_events() {
    let hub = BroadcastHub::new();
    let status = sample_status();
    hub.publish_tick(&sample_tick(105.0));

    let (_id, mut rx) = hub.subscribe(&status.snapshot());
    hub.publish_live_counts(1, 0);

    match rx.recv().await.unwrap() {
        WsEvent::Status { .. } => {}
        other => panic!("expected status first, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        WsEvent::Tick { price, .. } => assert_eq!(price, 105.0),
        other => panic!("expected snapshot tick, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        WsEvent::LiveCounts { up_count, down_count } => {
            assert_eq!((up_count, down_count), (1, 0));
        }
        other => panic!("expected live counts, got {:?}", other),
    }
}

#[tokio::test]
async fn joiner_before_first_tick_gets_status_only() {
    let hub = BroadcastHub::new();
    let status = sample_status();

    let (_id, mut rx) = hub.subscribe(&status.snapshot());
    match rx.recv().await.unwrap() {
        WsEvent::Status { .. } => {}
        other => panic!("expected status, got {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn stalled_subscriber_is_evicted_without_affecting_others() {
    let hub = BroadcastHub::new();
    let status = sample_status();

    let (_stalled_id, mut stalled_rx) = hub.subscribe(&status.snapshot());
    let (_healthy_id, mut healthy_rx) = hub.subscribe(&status.snapshot());
    assert_eq!(hub.subscriber_count(), 2);

    // Drain the healthy subscriber's snapshot event.
    assert!(matches!(
        healthy_rx.recv().await.unwrap(),
        WsEvent::Status { .. }
    ));

    // Publish more events than a subscriber queue can buffer; the healthy
    // subscriber keeps draining, the stalled one never does.
    let mut healthy_received = 0u64;
    for i in 0..100 {
        hub.publish_live_counts(i, 0);
        match healthy_rx.recv().await.unwrap() {
            WsEvent::LiveCounts { .. } => healthy_received += 1,
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(healthy_received, 100);
    assert_eq!(hub.subscriber_count(), 1);

    // The stalled subscriber's channel was dropped by the hub: it yields its
    // buffered backlog and then terminates.
    let mut backlog = 0u64;
    while stalled_rx.recv().await.is_some() {
        backlog += 1;
    }
    assert!(backlog < 100);
}

#[tokio::test]
async fn unsubscribe_removes_subscriber() {
    let hub = BroadcastHub::new();
    let status = sample_status();

    let (id, mut rx) = hub.subscribe(&status.snapshot());
    assert_eq!(hub.subscriber_count(), 1);

    hub.unsubscribe(id);
    assert_eq!(hub.subscriber_count(), 0);

    // Snapshot event was queued before unsubscribe; after it the channel ends.
    assert!(matches!(rx.recv().await, Some(WsEvent::Status { .. })));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn close_all_terminates_every_subscriber() {
    let hub = BroadcastHub::new();
    let status = sample_status();

    let (_id1, mut rx1) = hub.subscribe(&status.snapshot());
    let (_id2, mut rx2) = hub.subscribe(&status.snapshot());
    hub.close_all();
    assert_eq!(hub.subscriber_count(), 0);

    assert!(matches!(rx1.recv().await, Some(WsEvent::Status { .. })));
    assert!(rx1.recv().await.is_none());
    assert!(matches!(rx2.recv().await, Some(WsEvent::Status { .. })));
    assert!(rx2.recv().await.is_none());
}

#[tokio::test]
async fn latest_tick_tracks_the_newest_publish() {
    let hub = BroadcastHub::new();
    assert!(hub.latest_tick().is_none());

    hub.publish_tick(&sample_tick(100.0));
    hub.publish_tick(&sample_tick(106.5));
    assert_eq!(hub.latest_tick().unwrap().price, 106.5);
}
