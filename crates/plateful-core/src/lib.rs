//! Per-entity bookkeeping for optimistic toggles.
//!
//! This crate holds the pure, synchronous half of the Plateful toggle engine:
//! entity identifiers, the desired-state tracker, the in-flight guard and the
//! optimistic counter snapshot. Timers, networking and fan-out live in
//! `plateful-sdk`.

pub mod ids;
pub mod inflight;
pub mod phase;
pub mod snapshot;
pub mod tracker;

pub use ids::{EntityId, UserId, VisitId};
pub use inflight::{Acquire, InFlightGuard};
pub use phase::TogglePhase;
pub use snapshot::ToggleSnapshot;
pub use tracker::{DesiredEntry, DesiredStateTracker, Generation};
