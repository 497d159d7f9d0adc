//! Property-based tests for the per-entity bookkeeping.
//!
//! These tests verify the invariants the reconciler relies on:
//!  - The desired state always equals the inverse of the last observed tap
//!  - Only the latest tap's generation is current
//!  - At most one flight per entity, and deferrals survive until release
//!  - Optimistic counters stay within one of the confirmed value

use plateful_core::{Acquire, DesiredStateTracker, InFlightGuard, ToggleSnapshot};
use proptest::prelude::*;
use std::collections::HashMap;

fn taps_strategy() -> impl Strategy<Value = Vec<(u8, bool)>> {
    prop::collection::vec((0u8..5, any::<bool>()), 1..50)
}

proptest! {
    #[test]
    fn desired_reflects_last_tap(taps in taps_strategy()) {
        let mut tracker = DesiredStateTracker::new();
        let mut last: HashMap<u8, bool> = HashMap::new();

        for (id, observed) in &taps {
            tracker.record_tap(*id, *observed);
            last.insert(*id, !*observed);
        }

        for (id, desired) in last {
            prop_assert_eq!(tracker.desired(&id), Some(desired));
        }
    }

    #[test]
    fn only_latest_generation_is_current(taps in taps_strategy()) {
        let mut tracker = DesiredStateTracker::new();
        let mut stamps: Vec<(u8, u64)> = Vec::new();

        for (id, observed) in &taps {
            let entry = tracker.record_tap(*id, *observed);
            stamps.push((*id, entry.generation));
        }

        for (idx, (id, generation)) in stamps.iter().enumerate() {
            let superseded = stamps[idx + 1..].iter().any(|(other, _)| other == id);
            prop_assert_eq!(tracker.is_current(id, *generation), !superseded);
        }
    }

    #[test]
    fn guard_never_grants_twice(ops in prop::collection::vec((0u8..4, any::<bool>()), 1..60)) {
        let mut guard = InFlightGuard::new();
        let mut held: HashMap<u8, bool> = HashMap::new();
        let mut deferred: HashMap<u8, bool> = HashMap::new();

        for (id, acquire) in ops {
            if acquire {
                let result = guard.try_acquire(&id);
                if *held.get(&id).unwrap_or(&false) {
                    prop_assert_eq!(result, Acquire::Deferred);
                    deferred.insert(id, true);
                } else {
                    prop_assert_eq!(result, Acquire::Granted);
                    held.insert(id, true);
                }
            } else {
                let had_deferral = guard.release(&id);
                prop_assert_eq!(had_deferral, deferred.remove(&id).unwrap_or(false));
                held.insert(id, false);
            }
        }
    }

    #[test]
    fn optimistic_count_stays_near_confirmed(
        confirmed in 0u64..1000,
        start in any::<bool>(),
        taps in prop::collection::vec(any::<bool>(), 0..30),
    ) {
        let mut snap = ToggleSnapshot::new(start, confirmed);
        for state in taps {
            snap.apply_optimistic(state);
            prop_assert!(snap.count.abs_diff(confirmed) <= 1);
        }
    }
}
