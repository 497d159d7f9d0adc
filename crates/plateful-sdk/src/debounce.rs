//! Per-entity debounce timer.
//!
//! Each entity has at most one pending timer. Scheduling replaces (and
//! aborts) the previous one. Once a timer fires, its action is detached from
//! the slot before it starts, so later schedules or cancels for the same
//! entity never interrupt an action that is already running.

use parking_lot::Mutex;
use plateful_core::EntityId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Slot {
    ticket: u64,
    handle: JoinHandle<()>,
}

type Slots<K> = Arc<Mutex<HashMap<K, Slot>>>;

/// Cancelable delayed actions keyed by entity.
///
/// Must be used from within a tokio runtime.
pub struct DebounceTimer<K: EntityId> {
    slots: Slots<K>,
    next_ticket: AtomicU64,
}

impl<K: EntityId> DebounceTimer<K> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Run `action` after `delay`, replacing any timer pending for `id`.
    pub fn schedule<F>(&self, id: K, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(&self.slots);
        let key = id.clone();

        // Hold the lock across spawn so the task cannot look for its slot
        // before it has been inserted.
        let mut pending = self.slots.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slots = slots.lock();
                match slots.get(&key) {
                    Some(slot) if slot.ticket == ticket => {
                        slots.remove(&key);
                    }
                    _ => return,
                }
            }
            action.await;
        });

        if let Some(previous) = pending.insert(id, Slot { ticket, handle }) {
            previous.handle.abort();
        }
    }

    /// Drop the pending timer for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: &K) -> bool {
        match self.slots.lock().remove(id) {
            Some(slot) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending timer. Returns the ids that were pending.
    pub fn cancel_all(&self) -> Vec<K> {
        let drained: Vec<(K, Slot)> = self.slots.lock().drain().collect();
        drained
            .into_iter()
            .map(|(id, slot)| {
                slot.handle.abort();
                id
            })
            .collect()
    }

    pub fn is_pending(&self, id: &K) -> bool {
        self.slots.lock().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.lock().len()
    }
}

impl<K: EntityId> Default for DebounceTimer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityId> Drop for DebounceTimer<K> {
    fn drop(&mut self) {
        for (_, slot) in self.slots.lock().drain() {
            slot.handle.abort();
        }
    }
}
