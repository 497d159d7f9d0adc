//! Lifecycle phase of a single entity's toggle.

use serde::{Deserialize, Serialize};

/// Where an entity sits in the toggle state machine.
///
/// ```text
/// Idle -> Debouncing -> Syncing -> (ReconcileMismatch -> Syncing) -> Idle
/// ```
///
/// A tap moves any phase back to `Debouncing`, except that a running sync is
/// never interrupted: the new debounce queues behind it and the entity keeps
/// reporting `Syncing` until the request resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TogglePhase {
    Idle,
    Debouncing,
    Syncing,
    /// The server disagreed and the same desired state is being re-sent.
    ReconcileMismatch,
}

impl TogglePhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, TogglePhase::Idle)
    }

    /// Whether a network request is outstanding in this phase.
    pub fn is_syncing(&self) -> bool {
        matches!(self, TogglePhase::Syncing | TogglePhase::ReconcileMismatch)
    }
}
