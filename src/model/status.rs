use chrono::{DateTime, Utc};
use serde::Serialize;

/// Connectivity and scheduling snapshot exposed to viewers.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub chat_connected: bool,
    pub stream_live: bool,
    pub next_tick_at: DateTime<Utc>,
    pub tick_interval_secs: u64,
    pub up_keyword: String,
    pub down_keyword: String,
}
