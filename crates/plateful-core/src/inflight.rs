//! In-flight guard.
//!
//! At most one network request per entity may be outstanding. A sync that
//! arrives while one is running does not send; it leaves a deferral mark that
//! the running request's completion path picks up.

use std::collections::HashMap;
use std::hash::Hash;

/// Result of trying to start a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// The caller now owns the entity's request slot.
    Granted,
    /// Another request is outstanding; a follow-up cycle has been recorded.
    Deferred,
}

#[derive(Clone, Debug, Default)]
struct Flight {
    attempts: u32,
    deferred: bool,
}

/// Tracks which entities currently have a request outstanding.
#[derive(Clone, Debug)]
pub struct InFlightGuard<K: Eq + Hash> {
    flights: HashMap<K, Flight>,
}

impl<K: Eq + Hash + Clone> InFlightGuard<K> {
    pub fn new() -> Self {
        Self {
            flights: HashMap::new(),
        }
    }

    /// Claim the request slot for `id`.
    pub fn try_acquire(&mut self, id: &K) -> Acquire {
        match self.flights.get_mut(id) {
            Some(flight) => {
                flight.deferred = true;
                Acquire::Deferred
            }
            None => {
                self.flights.insert(id.clone(), Flight::default());
                Acquire::Granted
            }
        }
    }

    /// Count one more network attempt for the current flight.
    ///
    /// Returns the attempt number, starting at 1. Has no effect if `id` is
    /// not in flight.
    pub fn record_attempt(&mut self, id: &K) -> u32 {
        match self.flights.get_mut(id) {
            Some(flight) => {
                flight.attempts += 1;
                flight.attempts
            }
            None => 0,
        }
    }

    /// Number of attempts made by the current flight.
    pub fn attempts(&self, id: &K) -> u32 {
        self.flights.get(id).map_or(0, |f| f.attempts)
    }

    /// Release the slot. Returns whether a deferred cycle is waiting.
    pub fn release(&mut self, id: &K) -> bool {
        self.flights.remove(id).is_some_and(|f| f.deferred)
    }

    pub fn is_in_flight(&self, id: &K) -> bool {
        self.flights.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for InFlightGuard<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_deferred() {
        let mut guard = InFlightGuard::new();
        assert_eq!(guard.try_acquire(&"user-1"), Acquire::Granted);
        assert_eq!(guard.try_acquire(&"user-1"), Acquire::Deferred);
        assert!(guard.release(&"user-1"));
        assert!(!guard.is_in_flight(&"user-1"));
    }

    #[test]
    fn test_release_without_deferral() {
        let mut guard = InFlightGuard::new();
        guard.try_acquire(&"user-1");
        assert!(!guard.release(&"user-1"));
        assert_eq!(guard.try_acquire(&"user-1"), Acquire::Granted);
    }

    #[test]
    fn test_entities_are_independent() {
        let mut guard = InFlightGuard::new();
        assert_eq!(guard.try_acquire(&"a"), Acquire::Granted);
        assert_eq!(guard.try_acquire(&"b"), Acquire::Granted);
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_attempts_counted_per_flight() {
        let mut guard = InFlightGuard::new();
        assert_eq!(guard.record_attempt(&"a"), 0);
        guard.try_acquire(&"a");
        assert_eq!(guard.record_attempt(&"a"), 1);
        assert_eq!(guard.record_attempt(&"a"), 2);
        guard.release(&"a");
        guard.try_acquire(&"a");
        assert_eq!(guard.attempts(&"a"), 0);
    }
}
