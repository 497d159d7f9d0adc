//! Optimistic toggle reconciliation.
//!
//! A [`ToggleReconciler`] lets the user flip a boolean (like, save, follow)
//! as fast as they can tap while the server sees one request per quiet
//! period, never two overlapping requests for the same entity, and always
//! the absolute state the user last asked for.
//!
//! Per entity the lifecycle is:
//!
//! ```text
//! tap ──► optimistic callback ──► debounce ──► in-flight check ──► set_state(desired)
//!                                   ▲                                   │
//!                                   └──────── newer tap ◄───────────────┤
//!                                                                       ▼
//!                               confirmed / retry on mismatch / error callback
//! ```
//!
//! Failures never roll back the optimistic state. The next full refresh of the
//! screen reconciles it.

use crate::backend::{ToggleAck, ToggleBackend};
use crate::bus::EventBus;
use crate::config::ReconcilerConfig;
use crate::debounce::DebounceTimer;
use crate::error::SyncError;
use crate::features::Feature;
use parking_lot::Mutex;
use plateful_core::{Acquire, DesiredStateTracker, Generation, InFlightGuard, TogglePhase};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

type OptimisticFn = Box<dyn Fn(bool) + Send + Sync>;
type ConfirmedFn = Box<dyn Fn(bool, u64) + Send + Sync>;
type ErrorFn = Box<dyn Fn(SyncError) + Send + Sync>;

/// UI hooks for one toggle.
///
/// The optimistic hook runs synchronously inside [`ToggleReconciler::toggle`].
/// The other two run on the runtime once the server has answered. Any hook
/// may be left unset.
#[derive(Default)]
pub struct ToggleCallbacks {
    on_optimistic: Option<OptimisticFn>,
    on_confirmed: Option<ConfirmedFn>,
    on_error: Option<ErrorFn>,
}

impl ToggleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_optimistic(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_optimistic = Some(Box::new(f));
        self
    }

    pub fn on_confirmed(mut self, f: impl Fn(bool, u64) + Send + Sync + 'static) -> Self {
        self.on_confirmed = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(SyncError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn optimistic(&self, state: bool) {
        if let Some(f) = &self.on_optimistic {
            f(state);
        }
    }

    fn confirmed(&self, state: bool, count: u64) {
        if let Some(f) = &self.on_confirmed {
            f(state, count);
        }
    }

    fn error(&self, error: SyncError) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }
}

/// Everything mutable about the entities this reconciler manages.
///
/// Guarded by one lock that is never held across an await.
struct Ledger<K: plateful_core::EntityId> {
    desired: DesiredStateTracker<K>,
    flights: InFlightGuard<K>,
    callbacks: HashMap<K, Arc<ToggleCallbacks>>,
}

impl<K: plateful_core::EntityId> Ledger<K> {
    fn new() -> Self {
        Self {
            desired: DesiredStateTracker::new(),
            flights: InFlightGuard::new(),
            callbacks: HashMap::new(),
        }
    }

    fn forget(&mut self, id: &K) {
        self.desired.remove(id);
        self.callbacks.remove(id);
    }
}

/// How one sync cycle ended.
enum Cycle {
    /// Server holds the state that was sent.
    Agreed { state: bool, count: u64 },
    /// A newer tap changed the target while the server was disagreeing.
    Superseded,
    Cancelled,
    Failed(SyncError),
}

struct Inner<B: ToggleBackend> {
    feature: Feature,
    backend: B,
    config: ReconcilerConfig,
    ledger: Mutex<Ledger<B::Id>>,
    timers: DebounceTimer<B::Id>,
    bus: Option<EventBus<B::Id>>,
}

/// Debounced, coalescing, self-correcting toggle for one feature.
///
/// Create one per feature and share it (it is cheap to clone) with every
/// screen that shows that feature's toggle. Two reconcilers must never manage
/// the same entity.
pub struct ToggleReconciler<B: ToggleBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: ToggleBackend> Clone for ToggleReconciler<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ToggleBackend> ToggleReconciler<B> {
    pub fn new(feature: Feature, backend: B, config: ReconcilerConfig) -> Self {
        Self::build(feature, backend, config, None)
    }

    /// Create a reconciler that announces confirmations on `bus`.
    pub fn with_bus(
        feature: Feature,
        backend: B,
        config: ReconcilerConfig,
        bus: EventBus<B::Id>,
    ) -> Self {
        Self::build(feature, backend, config, Some(bus))
    }

    fn build(
        feature: Feature,
        backend: B,
        config: ReconcilerConfig,
        bus: Option<EventBus<B::Id>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                feature,
                backend,
                config,
                ledger: Mutex::new(Ledger::new()),
                timers: DebounceTimer::new(),
                bus,
            }),
        }
    }

    pub fn feature(&self) -> Feature {
        self.inner.feature
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Register a tap on an entity currently displayed as `observed`.
    ///
    /// Fires the optimistic callback with `!observed` before returning and
    /// (re)starts the entity's debounce window. Returns the new desired
    /// state. Must be called from within a tokio runtime.
    pub fn toggle(&self, id: B::Id, observed: bool, callbacks: ToggleCallbacks) -> bool {
        let callbacks = Arc::new(callbacks);
        callbacks.optimistic(!observed);

        // Record and schedule under one lock so the latest recorded tap always
        // owns the live timer, even when taps race on different threads.
        let mut ledger = self.inner.ledger.lock();
        ledger.callbacks.insert(id.clone(), Arc::clone(&callbacks));
        let entry = ledger.desired.record_tap(id.clone(), observed);

        let inner = Arc::clone(&self.inner);
        let key = id.clone();
        self.inner
            .timers
            .schedule(id.clone(), self.inner.config.debounce(), async move {
                inner.reconcile(key, entry.generation).await;
            });
        drop(ledger);

        debug!(
            feature = %self.inner.feature,
            %id,
            desired = entry.desired,
            generation = entry.generation,
            "toggle recorded"
        );
        entry.desired
    }

    /// Where `id` currently is in its toggle lifecycle.
    pub fn phase(&self, id: &B::Id) -> TogglePhase {
        let ledger = self.inner.ledger.lock();
        if ledger.flights.is_in_flight(id) {
            if ledger.flights.attempts(id) > 1 {
                TogglePhase::ReconcileMismatch
            } else {
                TogglePhase::Syncing
            }
        } else if self.inner.timers.is_pending(id) {
            TogglePhase::Debouncing
        } else {
            TogglePhase::Idle
        }
    }

    /// The state the user last asked for, while a sync is outstanding.
    pub fn desired_state(&self, id: &B::Id) -> Option<bool> {
        self.inner.ledger.lock().desired.desired(id)
    }

    pub fn is_in_flight(&self, id: &B::Id) -> bool {
        self.inner.ledger.lock().flights.is_in_flight(id)
    }

    /// Entities with a tap that has not finished syncing.
    pub fn tracked_entities(&self) -> Vec<B::Id> {
        self.inner.ledger.lock().desired.ids().cloned().collect()
    }

    /// Stop tracking `id`, e.g. because it was deleted.
    ///
    /// A pending debounce is dropped without syncing. A request already in
    /// flight runs to completion but reports nothing.
    pub fn forget(&self, id: &B::Id) {
        self.inner.timers.cancel(id);
        self.inner.ledger.lock().forget(id);
    }

    /// Drop every pending debounce without syncing.
    ///
    /// Requests already in flight still run to completion. A pending timer
    /// always belongs to the entity's latest tap, so an in-flight request for
    /// the same entity is already stale and reports nothing.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.timers.cancel_all();
        let mut ledger = self.inner.ledger.lock();
        for id in &cancelled {
            ledger.forget(id);
        }
        cancelled.len()
    }
}

impl<B: ToggleBackend> Inner<B> {
    /// Debounce expiry for the tap stamped `generation`.
    async fn reconcile(self: Arc<Self>, id: B::Id, generation: Generation) {
        {
            let mut ledger = self.ledger.lock();
            if !ledger.desired.is_current(&id, generation) {
                debug!(feature = %self.feature, %id, "superseded before sync");
                return;
            }
            if ledger.flights.try_acquire(&id) == Acquire::Deferred {
                debug!(feature = %self.feature, %id, "request in flight, deferring");
                return;
            }
        }

        self.drive(id).await;
    }

    /// Run sync cycles for `id` until no deferred tap is waiting.
    ///
    /// The caller must hold the entity's in-flight slot.
    async fn drive(&self, id: B::Id) {
        loop {
            let next = {
                let mut ledger = self.ledger.lock();
                let entry = ledger.desired.get(&id);
                let callbacks = ledger.callbacks.get(&id).cloned();
                match (entry, callbacks) {
                    (Some(entry), Some(callbacks)) => Some((entry, callbacks)),
                    _ => {
                        ledger.flights.release(&id);
                        None
                    }
                }
            };
            let Some((entry, callbacks)) = next else {
                return;
            };

            let cycle = self.sync_cycle(&id, entry.desired, entry.generation).await;
            if !self.finish(&id, entry.generation, cycle, &callbacks) {
                return;
            }
        }
    }

    /// Send the desired state, re-sending while the server disagrees.
    async fn sync_cycle(&self, id: &B::Id, target: bool, generation: Generation) -> Cycle {
        loop {
            let attempt = self.ledger.lock().flights.record_attempt(id);
            debug!(feature = %self.feature, %id, desired = target, attempt, "sending");

            let ack = match self.backend.set_state(id, target).await {
                Ok(ack) => ack,
                Err(e) if e.is_cancelled() => return Cycle::Cancelled,
                Err(e) => return Cycle::Failed(SyncError::Backend(e)),
            };

            if ack.state() == target {
                return Cycle::Agreed {
                    state: ack.state(),
                    count: ack.count(),
                };
            }

            if !self.ledger.lock().desired.is_current(id, generation) {
                return Cycle::Superseded;
            }
            if attempt >= self.config.max_attempts {
                return Cycle::Failed(SyncError::Mismatch {
                    desired: target,
                    attempts: attempt,
                });
            }
            warn!(
                feature = %self.feature,
                %id,
                desired = target,
                server = ack.state(),
                attempt,
                "server disagreed, re-sending"
            );
        }
    }

    /// Commit the outcome of a cycle. Returns whether another cycle must run.
    fn finish(
        &self,
        id: &B::Id,
        generation: Generation,
        cycle: Cycle,
        callbacks: &ToggleCallbacks,
    ) -> bool {
        let (current, rerun) = {
            let mut ledger = self.ledger.lock();
            let current = ledger.desired.clear_if_current(id, generation);
            let rerun = ledger.flights.release(id);
            if current {
                ledger.callbacks.remove(id);
            }
            if rerun {
                ledger.flights.try_acquire(id);
            }
            (current, rerun)
        };

        match cycle {
            Cycle::Agreed { state, count } if current => {
                info!(feature = %self.feature, %id, state, count, "confirmed");
                callbacks.confirmed(state, count);
                if let Some(bus) = &self.bus {
                    bus.publish(self.feature, id.clone(), state, count);
                }
            }
            Cycle::Agreed { state, .. } => {
                debug!(feature = %self.feature, %id, state, "confirmed stale target, newer tap pending");
            }
            Cycle::Failed(error) if current => {
                warn!(feature = %self.feature, %id, %error, "sync failed, keeping optimistic state");
                callbacks.error(error);
            }
            Cycle::Failed(error) => {
                debug!(feature = %self.feature, %id, %error, "stale sync failed, newer tap pending");
            }
            Cycle::Superseded => {
                debug!(feature = %self.feature, %id, "mismatch superseded by newer tap");
            }
            Cycle::Cancelled => {
                debug!(feature = %self.feature, %id, "request cancelled");
            }
        }

        rerun
    }
}
