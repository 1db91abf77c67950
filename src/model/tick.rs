use chrono::{DateTime, Utc};
use serde::Serialize;

/// One persisted price update. Created only by the tick scheduler,
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub change_percent: f64,
    pub up_count: u64,
    pub down_count: u64,
}
