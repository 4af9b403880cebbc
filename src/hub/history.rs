//! Fixed-capacity notification history.
//!
//! When the log is full, appending **evicts** the oldest entry so that the
//! most recent `capacity` notifications are always available for replay to a
//! dashboard that connects mid-workflow.
//!
//! # Example
//!
//! ```rust
//! use vision_controller::hub::{NotificationEntry, NotificationLevel, NotificationLog};
//!
//! let mut log = NotificationLog::new(2);
//! for msg in ["a", "b", "c"] {
//!     log.append(NotificationEntry::now(msg, NotificationLevel::Info));
//! }
//! let kept: Vec<_> = log.snapshot_in_order().into_iter().map(|e| e.message).collect();
//! assert_eq!(kept, vec!["b", "c"]);
//! ```

use std::collections::VecDeque;

use super::message::NotificationEntry;

// ---------------------------------------------------------------------------
// NotificationLog
// ---------------------------------------------------------------------------

/// A bounded FIFO of [`NotificationEntry`] values.
///
/// ## Overflow behaviour
///
/// When [`append`](Self::append) would exceed `capacity`, the oldest entry is
/// dropped.  The log never grows beyond its initial capacity.
#[derive(Debug)]
pub struct NotificationLog {
    entries: VecDeque<NotificationEntry>,
    capacity: usize,
}

impl NotificationLog {
    /// Create a log holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "NotificationLog capacity must be > 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `entry`, evicting the oldest one first when at capacity.
    pub fn append(&mut self, entry: NotificationEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// All retained entries, oldest first.
    pub fn snapshot_in_order(&self) -> Vec<NotificationEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate retained entries, oldest first, without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &NotificationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::NotificationLevel;

    fn entry(msg: &str) -> NotificationEntry {
        NotificationEntry::now(msg, NotificationLevel::Info)
    }

    fn messages(log: &NotificationLog) -> Vec<String> {
        log.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn append_within_capacity_keeps_order() {
        let mut log = NotificationLog::new(8);
        log.append(entry("one"));
        log.append(entry("two"));
        log.append(entry("three"));

        assert_eq!(log.len(), 3);
        assert_eq!(messages(&log), vec!["one", "two", "three"]);
    }

    #[test]
    fn overflow_by_one_drops_oldest() {
        let mut log = NotificationLog::new(4);
        for i in 1..=5 {
            log.append(entry(&i.to_string()));
        }

        assert_eq!(log.len(), 4);
        assert_eq!(messages(&log), vec!["2", "3", "4", "5"]);
    }

    /// After `capacity + k` appends exactly the newest `capacity` remain.
    #[test]
    fn never_exceeds_capacity() {
        let capacity = 100;
        let mut log = NotificationLog::new(capacity);
        for i in 0..(capacity + 37) {
            log.append(entry(&i.to_string()));
            assert!(log.len() <= capacity);
        }

        let kept = messages(&log);
        assert_eq!(kept.len(), capacity);
        assert_eq!(kept.first().map(String::as_str), Some("37"));
        assert_eq!(kept.last().map(String::as_str), Some("136"));
    }

    #[test]
    fn snapshot_is_oldest_first_and_detached() {
        let mut log = NotificationLog::new(3);
        log.append(entry("a"));
        log.append(entry("b"));

        let snap = log.snapshot_in_order();
        log.append(entry("c"));

        let snap_msgs: Vec<_> = snap.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(snap_msgs, vec!["a", "b"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn empty_log() {
        let log = NotificationLog::new(5);
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 5);
        assert!(log.snapshot_in_order().is_empty());
    }

    #[test]
    #[should_panic(expected = "NotificationLog capacity must be > 0")]
    fn zero_capacity_panics() {
        let _log = NotificationLog::new(0);
    }
}
