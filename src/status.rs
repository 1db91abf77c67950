use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::RwLock;
use std::time::Duration;

use crate::model::status::ConnectionStatus;

/// Shared connectivity/liveness record. Writers update individual fields,
/// readers always get a consistent snapshot.
#[derive(Debug)]
pub struct StatusTracker {
    inner: RwLock<ConnectionStatus>,
}

impl StatusTracker {
    pub fn new(up_keyword: &str, down_keyword: &str, tick_interval: Duration) -> Self {
        let interval_secs = tick_interval.as_secs();
        Self {
            inner: RwLock::new(ConnectionStatus {
                chat_connected: false,
                stream_live: false,
                next_tick_at: Utc::now() + ChronoDuration::seconds(interval_secs as i64),
                tick_interval_secs: interval_secs,
                up_keyword: up_keyword.to_string(),
                down_keyword: down_keyword.to_string(),
            }),
        }
    }

    pub fn snapshot(&self) -> ConnectionStatus {
        self.inner.read().unwrap().clone()
    }

    /// Returns the new snapshot if the flag actually changed.
    pub fn set_chat_connected(&self, connected: bool) -> Option<ConnectionStatus> {
        let mut guard = self.inner.write().unwrap();
        if guard.chat_connected == connected {
            return None;
        }
        guard.chat_connected = connected;
        Some(guard.clone())
    }

    /// Returns the new snapshot if the flag actually changed.
    pub fn set_stream_live(&self, live: bool) -> Option<ConnectionStatus> {
        let mut guard = self.inner.write().unwrap();
        if guard.stream_live == live {
            return None;
        }
        guard.stream_live = live;
        Some(guard.clone())
    }

    pub fn set_next_tick_at(&self, at: DateTime<Utc>) {
        self.inner.write().unwrap().next_tick_at = at;
    }
}
