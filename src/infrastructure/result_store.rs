use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use tokio::sync::watch;

/// A deposited result. `seq` identifies the deposit, so a take only removes the
/// exact entry the taker observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub key: String,
    pub value: String,
    seq: u64,
}

impl ResultEntry {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

type Slot = watch::Sender<Option<ResultEntry>>;

/// Drop the slot for `key` once it holds nothing and nobody watches it
fn prune(slots: &mut HashMap<String, Slot>, key: &str) {
    let unused = slots
        .get(key)
        .is_some_and(|slot| slot.receiver_count() == 0 && slot.borrow().is_none());
    if unused {
        slots.remove(key);
    }
}

/// In-memory result table: one watch slot per key, all mutations under one lock.
#[derive(Debug, Default)]
pub struct ResultStore {
    slots: Mutex<HashMap<String, Slot>>,
    next_seq: AtomicU64,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert; returns the deposit sequence number
    pub fn insert(&self, key: &str, value: String) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = ResultEntry {
            key: key.to_string(),
            value,
            seq,
        };
        let mut slots = self.slots();
        let slot = slots
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(None).0);
        if slot.send_replace(Some(entry)).is_some() {
            log::debug!("Replaced pending result for key {key}");
        }
        seq
    }

    /// Remove the entry under `key`; returns whether one existed
    pub fn delete(&self, key: &str) -> bool {
        let mut slots = self.slots();
        let Some(slot) = slots.get(key) else {
            return false;
        };
        let existed = slot.send_replace(None).is_some();
        prune(&mut slots, key);
        existed
    }

    /// Remove the entry under `key` only if it is still deposit `seq`
    pub fn take(&self, key: &str, seq: u64) -> bool {
        let mut slots = self.slots();
        let Some(slot) = slots.get(key) else {
            return false;
        };
        let taken = slot.send_if_modified(|current| {
            if current.as_ref().is_some_and(|entry| entry.seq == seq) {
                *current = None;
                true
            } else {
                false
            }
        });
        prune(&mut slots, key);
        taken
    }

    /// Called after a watcher of `key` went away
    pub fn release(&self, key: &str) {
        prune(&mut self.slots(), key);
    }

    pub fn get(&self, key: &str) -> Option<ResultEntry> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.borrow().clone())
    }

    /// A receiver for `key`, creating an empty slot if needed
    pub fn watch(&self, key: &str) -> watch::Receiver<Option<ResultEntry>> {
        self.slots()
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Number of keys currently holding a result
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.borrow().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots().len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_insert_is_last_write_wins() {
        let store = ResultStore::new();
        store.insert("FILTER_RESULT", "v1".to_string());
        store.insert("FILTER_RESULT", "v2".to_string());

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("FILTER_RESULT").map(|entry| entry.value),
            Some("v2".to_string())
        );
    }

    #[test]
    fn test_delete_reports_existence() {
        let store = ResultStore::new();
        assert!(!store.delete("missing"));

        store.insert("key", "value".to_string());
        assert!(store.delete("key"));
        assert!(!store.delete("key"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_take_only_removes_the_observed_deposit() {
        let store = ResultStore::new();
        let first = store.insert("key", "v1".to_string());
        let second = store.insert("key", "v2".to_string());

        assert!(!store.take("key", first));
        assert_eq!(store.get("key").map(|entry| entry.seq()), Some(second));

        assert!(store.take("key", second));
        assert_eq!(store.get("key"), None);
        assert!(!store.take("key", second));
    }

    #[test]
    fn test_watch_sees_deposits() {
        let store = ResultStore::new();
        let mut rx = store.watch("key");
        assert_eq!(*rx.borrow_and_update(), None);

        store.insert("key", "value".to_string());
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|entry| entry.value.as_str()),
            Some("value")
        );
    }

    #[test]
    fn test_released_empty_slots_are_pruned() {
        let store = ResultStore::new();
        for i in 0..50 {
            let key = format!("key{i}");
            drop(store.watch(&key));
            store.release(&key);
        }
        assert_eq!(store.slot_count(), 0);

        let rx = store.watch("watched");
        store.insert("stored", "value".to_string());
        store.release("watched");
        store.release("stored");
        assert_eq!(store.slot_count(), 2);

        drop(rx);
        store.release("watched");
        assert_eq!(store.slot_count(), 1);
    }

    #[test]
    fn test_take_without_watchers_prunes_slot() {
        let store = ResultStore::new();
        let seq = store.insert("key", "value".to_string());
        assert!(store.take("key", seq));
        assert_eq!(store.slot_count(), 0);
    }

    #[test]
    fn test_delete_keeps_slot_while_watched() {
        let store = ResultStore::new();
        let rx = store.watch("key");
        store.insert("key", "value".to_string());
        assert!(store.delete("key"));

        store.insert("key", "again".to_string());
        assert_eq!(
            rx.borrow().as_ref().map(|entry| entry.value.clone()),
            Some("again".to_string())
        );
    }
}
