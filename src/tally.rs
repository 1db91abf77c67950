use std::sync::Mutex;

/// Up/down vote counters for the current tick window.
///
/// Incremented by the chat listener, drained by the tick scheduler. All
/// access goes through the inner mutex so a `take` at the tick boundary can
/// never lose or double-count a concurrent increment.
#[derive(Debug, Default)]
pub struct KeywordTally {
    counts: Mutex<(u64, u64)>,
}

impl KeywordTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_up(&self) {
        self.counts.lock().unwrap().0 += 1;
    }

    pub fn increment_down(&self) {
        self.counts.lock().unwrap().1 += 1;
    }

    /// Current `(up, down)` counts without resetting the window.
    pub fn counts(&self) -> (u64, u64) {
        *self.counts.lock().unwrap()
    }

    /// Snapshot the window and reset both counters atomically.
    pub fn take(&self) -> (u64, u64) {
        let mut guard = self.counts.lock().unwrap();
        std::mem::take(&mut *guard)
    }
}
