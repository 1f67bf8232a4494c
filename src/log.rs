use crate::event::Event;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Newest-first record of fired events, bounded by age only.
#[derive(Debug)]
pub(crate) struct EventLog {
    ttl: Duration,
    entries: Mutex<VecDeque<Event>>,
}

impl EventLog {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Prepends `event`, then drops everything older than the retention window.
    pub(crate) fn record(&self, event: Event) {
        let oldest = self.oldest_kept(Utc::now());
        let mut entries = self.entries.lock();
        entries.push_front(event);
        entries.retain(|entry| entry.time() >= oldest);
    }

    pub(crate) fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().iter().cloned().collect()
    }

    fn oldest_kept(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
