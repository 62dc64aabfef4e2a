// Introspection — bounded history of append-only events
//
// Each component owns its logs and is the only writer; everyone else gets
// read-only snapshots. Fields filled in after recording are set-once.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct EventLog<T> {
    capacity: usize,
    events: RwLock<VecDeque<Arc<T>>>,
}

impl<T> EventLog<T> {
    /// A capacity of zero is treated as one: the latest event is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `event`, evicting the oldest when full. Returns the shared
    /// handle so the writer can keep filling set-once fields.
    pub(crate) fn record(&self, event: T) -> Arc<T> {
        let event = Arc::new(event);
        let mut events = self.events.write();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        event
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.events.read().back().cloned()
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Arc<T>> {
        self.events.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_event() {
        let log = EventLog::new(4);
        assert!(log.latest().is_none());

        log.record("a");
        log.record("b");
        assert_eq!(*log.latest().unwrap(), "b");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_log_is_bounded() {
        let log = EventLog::new(3);
        for i in 0..10 {
            log.record(i);
        }

        let recent: Vec<i32> = log.recent().iter().map(|e| **e).collect();
        assert_eq!(recent, vec![7, 8, 9]);
        assert_eq!(log.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let log = EventLog::new(0);
        log.record(1);
        log.record(2);
        assert_eq!(log.len(), 1);
        assert_eq!(*log.latest().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_outlives_new_events() {
        let log = EventLog::new(1);
        log.record(String::from("first"));
        let held = log.latest().unwrap();
        log.record(String::from("second"));
        assert_eq!(held.as_str(), "first");
    }
}
