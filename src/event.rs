use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::status::ConnectionStatus;
use crate::model::tick::PriceTick;

#[derive(Debug, Clone)]
pub enum ChatConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay_ms: u64 },
}

/// Outbound WebSocket event, JSON-tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    Tick {
        timestamp: DateTime<Utc>,
        price: f64,
        change_percent: f64,
        up_count: u64,
        down_count: u64,
    },
    LiveCounts {
        up_count: u64,
        down_count: u64,
    },
    Status {
        chat_connected: bool,
        stream_live: bool,
        next_tick_at: DateTime<Utc>,
    },
}

impl WsEvent {
    pub fn tick(tick: &PriceTick) -> Self {
        Self::Tick {
            timestamp: tick.timestamp,
            price: tick.price,
            change_percent: tick.change_percent,
            up_count: tick.up_count,
            down_count: tick.down_count,
        }
    }

    pub fn live_counts(up_count: u64, down_count: u64) -> Self {
        Self::LiveCounts {
            up_count,
            down_count,
        }
    }

    pub fn status(status: &ConnectionStatus) -> Self {
        Self::Status {
            chat_connected: status.chat_connected,
            stream_live: status.stream_live,
            next_tick_at: status.next_tick_at,
        }
    }
}
