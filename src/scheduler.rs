use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::engine::{next_price, PriceParams};
use crate::hub::BroadcastHub;
use crate::model::tick::PriceTick;
use crate::status::StatusTracker;
use crate::store::HistoryStore;
use crate::tally::KeywordTally;

/// Fixed-interval price ticker. Each fire drains the tally, derives the next
/// price, persists the tick and then broadcasts it. The cadence is wall-clock
/// periodic and does not depend on chat connectivity.
pub struct TickScheduler {
    interval: Duration,
    params: PriceParams,
    initial_price: f64,
    tally: Arc<KeywordTally>,
    status: Arc<StatusTracker>,
    hub: Arc<BroadcastHub>,
    store: HistoryStore,
}

impl TickScheduler {
    pub fn new(
        interval: Duration,
        params: PriceParams,
        initial_price: f64,
        tally: Arc<KeywordTally>,
        status: Arc<StatusTracker>,
        hub: Arc<BroadcastHub>,
        store: HistoryStore,
    ) -> Self {
        Self {
            interval,
            params,
            initial_price,
            tally,
            status,
            hub,
            store,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut current_price = match self.store.latest() {
            Ok(Some(tick)) => {
                tracing::info!(price = tick.price, "Resuming price series from history");
                tick.price
            }
            Ok(None) => self.initial_price,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read last tick, starting from initial price");
                self.initial_price
            }
        };

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval yields immediately once; consume it so the first window
        // spans a full interval
        ticker.tick().await;
        self.status.set_next_tick_at(Utc::now() + self.chrono_interval());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    current_price = self.fire(current_price);
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Tick scheduler stopped");
    }

    fn fire(&self, current_price: f64) -> f64 {
        let (up_count, down_count) = self.tally.take();
        let update = next_price(&self.params, current_price, up_count, down_count);
        let tick = PriceTick {
            timestamp: Utc::now(),
            price: update.price,
            change_percent: update.change_percent,
            up_count,
            down_count,
        };

        // Persistence comes before broadcast; a store failure is logged and
        // the tick still goes out.
        if let Err(e) = self.store.append(&tick) {
            tracing::warn!(error = %e, "Failed to persist tick");
        }
        self.status.set_next_tick_at(Utc::now() + self.chrono_interval());
        self.hub.publish_tick(&tick);

        tracing::debug!(
            price = tick.price,
            change_percent = tick.change_percent,
            up_count,
            down_count,
            "Tick fired"
        );
        update.price
    }

    fn chrono_interval(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.interval.as_secs() as i64)
    }
}
