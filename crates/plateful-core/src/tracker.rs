//! Desired-state tracker.
//!
//! Records, per entity, the value the user most recently asked for. Every tap
//! is stamped with a [`Generation`] drawn from a tracker-wide counter, so a
//! scheduled or in-flight sync can tell whether a newer tap has superseded the
//! one that started it, even if the entry was removed and recreated meanwhile.

use std::collections::HashMap;
use std::hash::Hash;

/// Monotonic stamp identifying a single tap.
pub type Generation = u64;

/// The latest intent recorded for one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DesiredEntry {
    /// The state the user wants the server to hold.
    pub desired: bool,
    /// Stamp of the tap that set `desired`.
    pub generation: Generation,
}

/// Per-entity desired state, keyed by entity id.
#[derive(Clone, Debug)]
pub struct DesiredStateTracker<K: Eq + Hash> {
    entries: HashMap<K, DesiredEntry>,
    next_generation: Generation,
}

impl<K: Eq + Hash + Clone> DesiredStateTracker<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Record a tap on an entity currently displayed as `observed`.
    ///
    /// The desired state becomes `!observed`, overwriting whatever was
    /// recorded before. Returns the new entry.
    pub fn record_tap(&mut self, id: K, observed: bool) -> DesiredEntry {
        let entry = DesiredEntry {
            desired: !observed,
            generation: self.next_generation,
        };
        self.next_generation += 1;
        self.entries.insert(id, entry);
        entry
    }

    pub fn get(&self, id: &K) -> Option<DesiredEntry> {
        self.entries.get(id).copied()
    }

    pub fn desired(&self, id: &K) -> Option<bool> {
        self.entries.get(id).map(|e| e.desired)
    }

    /// Whether `generation` is still the latest tap for `id`.
    pub fn is_current(&self, id: &K, generation: Generation) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.generation == generation)
    }

    /// Drop the entry for `id` unless a newer tap replaced `generation`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn clear_if_current(&mut self, id: &K, generation: Generation) -> bool {
        if self.is_current(id, generation) {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, id: &K) -> Option<DesiredEntry> {
        self.entries.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for DesiredStateTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_inverts_observed_state() {
        let mut tracker = DesiredStateTracker::new();
        assert!(tracker.record_tap("visit-1", false).desired);
        assert!(!tracker.record_tap("visit-1", true).desired);
        assert_eq!(tracker.desired(&"visit-1"), Some(false));
    }

    #[test]
    fn test_newer_tap_supersedes_generation() {
        let mut tracker = DesiredStateTracker::new();
        let first = tracker.record_tap("visit-1", false);
        let second = tracker.record_tap("visit-1", true);

        assert!(second.generation > first.generation);
        assert!(!tracker.is_current(&"visit-1", first.generation));
        assert!(tracker.is_current(&"visit-1", second.generation));
    }

    #[test]
    fn test_clear_if_current_keeps_newer_taps() {
        let mut tracker = DesiredStateTracker::new();
        let first = tracker.record_tap("visit-1", false);
        let second = tracker.record_tap("visit-1", true);

        assert!(!tracker.clear_if_current(&"visit-1", first.generation));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.clear_if_current(&"visit-1", second.generation));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_generations_not_reused_after_removal() {
        let mut tracker = DesiredStateTracker::new();
        let first = tracker.record_tap("visit-1", false);
        tracker.remove(&"visit-1");
        let again = tracker.record_tap("visit-1", false);

        assert_ne!(first.generation, again.generation);
        assert!(!tracker.is_current(&"visit-1", first.generation));
    }
}
