//! What a screen shows for one toggle: the boolean and its counter.
//!
//! Counts are authoritative only when they come from the server. Between a
//! tap and the next response the UI shows a transient ±1 adjustment.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSnapshot {
    pub state: bool,
    pub count: u64,
}

impl ToggleSnapshot {
    pub fn new(state: bool, count: u64) -> Self {
        Self { state, count }
    }

    /// Apply the optimistic effect of moving to `state`.
    ///
    /// Re-applying the current state is a no-op, so the counter never drifts
    /// by more than one away from the last confirmed value.
    pub fn apply_optimistic(&mut self, state: bool) {
        if state == self.state {
            return;
        }
        self.state = state;
        self.count = if state {
            self.count.saturating_add(1)
        } else {
            self.count.saturating_sub(1)
        };
    }

    /// Overwrite with the server's answer.
    pub fn apply_confirmed(&mut self, state: bool, count: u64) {
        self.state = state;
        self.count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_like_and_unlike() {
        let mut snap = ToggleSnapshot::new(false, 10);
        snap.apply_optimistic(true);
        assert_eq!(snap, ToggleSnapshot::new(true, 11));
        snap.apply_optimistic(false);
        assert_eq!(snap, ToggleSnapshot::new(false, 10));
    }

    #[test]
    fn test_optimistic_same_state_is_noop() {
        let mut snap = ToggleSnapshot::new(true, 3);
        snap.apply_optimistic(true);
        assert_eq!(snap.count, 3);
    }

    #[test]
    fn test_unlike_never_underflows() {
        let mut snap = ToggleSnapshot::new(true, 0);
        snap.apply_optimistic(false);
        assert_eq!(snap.count, 0);
    }

    #[test]
    fn test_confirmed_overwrites_optimistic() {
        let mut snap = ToggleSnapshot::new(false, 10);
        snap.apply_optimistic(true);
        snap.apply_confirmed(true, 42);
        assert_eq!(snap, ToggleSnapshot::new(true, 42));
    }
}
