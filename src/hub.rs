use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::WsEvent;
use crate::model::status::ConnectionStatus;
use crate::model::tick::PriceTick;

/// Outbound queue depth per subscriber. A subscriber that falls this far
/// behind is evicted rather than allowed to stall the publisher.
const SUBSCRIBER_QUEUE: usize = 32;

/// Fan-out registry of live viewer connections.
///
/// Every send is `try_send`: a full or closed queue drops that subscriber and
/// never blocks delivery to the others. The hub also remembers the latest
/// tick so joiners start from a populated state.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    inner: Mutex<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    subscribers: HashMap<Uuid, mpsc::Sender<WsEvent>>,
    latest_tick: Option<PriceTick>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. The current status and latest tick are
    /// queued before the subscriber becomes visible to live publishes, so a
    /// joiner always sees the snapshot first.
    pub fn subscribe(&self, status: &ConnectionStatus) -> (Uuid, mpsc::Receiver<WsEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = Uuid::new_v4();

        let mut inner = self.inner.lock().unwrap();
        let _ = tx.try_send(WsEvent::status(status));
        if let Some(tick) = &inner.latest_tick {
            let _ = tx.try_send(WsEvent::tick(tick));
        }
        inner.subscribers.insert(id, tx);
        tracing::debug!(subscriber = %id, total = inner.subscribers.len(), "Subscriber joined");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if inner.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = %id, total = inner.subscribers.len(), "Subscriber left");
        }
    }

    pub fn publish_tick(&self, tick: &PriceTick) {
        let mut inner = self.inner.lock().unwrap();
        inner.latest_tick = Some(tick.clone());
        Self::fan_out(&mut inner, WsEvent::tick(tick));
    }

    pub fn publish_live_counts(&self, up_count: u64, down_count: u64) {
        let mut inner = self.inner.lock().unwrap();
        Self::fan_out(&mut inner, WsEvent::live_counts(up_count, down_count));
    }

    pub fn publish_status(&self, status: &ConnectionStatus) {
        let mut inner = self.inner.lock().unwrap();
        Self::fan_out(&mut inner, WsEvent::status(status));
    }

    /// Latest tick seen by the hub, if any tick has fired yet.
    pub fn latest_tick(&self) -> Option<PriceTick> {
        self.inner.lock().unwrap().latest_tick.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    /// Drop every subscriber; their receivers terminate on the closed channel.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let dropped = inner.subscribers.len();
        inner.subscribers.clear();
        if dropped > 0 {
            tracing::info!(dropped, "Closed all subscriber channels");
        }
    }

    fn fan_out(inner: &mut HubInner, event: WsEvent) {
        let mut evicted = Vec::new();
        for (id, tx) in &inner.subscribers {
            if tx.try_send(event.clone()).is_err() {
                evicted.push(*id);
            }
        }
        for id in evicted {
            inner.subscribers.remove(&id);
            tracing::warn!(subscriber = %id, "Evicting slow or disconnected subscriber");
        }
    }
}
