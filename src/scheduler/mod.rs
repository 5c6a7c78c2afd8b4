use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// Global debounce slots used by the client. Per-note saves key their own table
/// by note id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Navigation,
    Search,
}

#[derive(Debug)]
struct Pending<T> {
    deadline: Instant,
    payload: T,
}

/// Table of pending debounced tasks, one per key.
///
/// Scheduling a key that is already pending replaces the earlier entry; the
/// superseded payload is handed back to the caller and never fires. The owner
/// drives the table by calling [`DebounceTable::take_due`] from its tick.
#[derive(Debug)]
pub struct DebounceTable<K, T> {
    pending: IndexMap<K, Pending<T>>,
}

impl<K, T> Default for DebounceTable<K, T> {
    fn default() -> Self {
        Self {
            pending: IndexMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, T> DebounceTable<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, key: K, payload: T, delay: Duration, now: Instant) -> Option<T> {
        let superseded = self.pending.shift_remove(&key).map(|entry| entry.payload);
        self.pending.insert(
            key,
            Pending {
                deadline: now + delay,
                payload,
            },
        );
        superseded
    }

    pub fn cancel(&mut self, key: &K) -> Option<T> {
        self.pending.shift_remove(key).map(|entry| entry.payload)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Removes and returns every entry whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, T)> {
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let mut due: Vec<(Instant, K, T)> = due_keys
            .into_iter()
            .filter_map(|key| {
                self.pending
                    .shift_remove(&key)
                    .map(|entry| (entry.deadline, key, entry.payload))
            })
            .collect();
        due.sort_by_key(|(deadline, _, _)| *deadline);
        due.into_iter().map(|(_, key, payload)| (key, payload)).collect()
    }

    /// Removes every entry regardless of deadline, earliest first.
    pub fn drain_all(&mut self) -> Vec<(K, T)> {
        let mut all: Vec<(Instant, K, T)> = self
            .pending
            .drain(..)
            .map(|(key, entry)| (entry.deadline, key, entry.payload))
            .collect();
        all.sort_by_key(|(deadline, _, _)| *deadline);
        all.into_iter().map(|(_, key, payload)| (key, payload)).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|entry| entry.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn rescheduling_replaces_pending_entry() {
        let start = Instant::now();
        let mut table = DebounceTable::new();
        assert_eq!(table.schedule(Slot::Search, "a", 500 * MS, start), None);
        assert_eq!(table.schedule(Slot::Search, "ab", 500 * MS, start + 100 * MS), Some("a"));
        assert_eq!(table.len(), 1);

        assert!(table.take_due(start + 500 * MS).is_empty());
        assert_eq!(table.take_due(start + 600 * MS), vec![(Slot::Search, "ab")]);
        assert!(table.is_empty());
    }

    #[test]
    fn zero_delay_is_due_on_next_poll() {
        let now = Instant::now();
        let mut table = DebounceTable::new();
        table.schedule(Slot::Navigation, 7_i64, Duration::ZERO, now);
        assert_eq!(table.take_due(now), vec![(Slot::Navigation, 7)]);
    }

    #[test]
    fn due_entries_come_back_in_deadline_order() {
        let now = Instant::now();
        let mut table = DebounceTable::new();
        table.schedule(3_i64, "late", 30 * MS, now);
        table.schedule(1_i64, "early", 10 * MS, now);
        table.schedule(2_i64, "later", 90 * MS, now);
        assert_eq!(table.next_deadline(), Some(now + 10 * MS));
        assert_eq!(table.take_due(now + 50 * MS), vec![(1, "early"), (3, "late")]);
        assert!(table.is_pending(&2));
        assert_eq!(table.drain_all(), vec![(2, "later")]);
    }

    #[test]
    fn cancel_drops_the_entry() {
        let now = Instant::now();
        let mut table = DebounceTable::new();
        table.schedule(Slot::Search, (), 5 * MS, now);
        assert_eq!(table.cancel(&Slot::Search), Some(()));
        assert!(!table.is_pending(&Slot::Search));
        assert!(table.take_due(now + 10 * MS).is_empty());
        assert_eq!(table.next_deadline(), None);
    }
}
