//! Composition root for the toggle features.

use crate::bus::EventBus;
use crate::config::ReconcilerConfig;
use crate::error::{Result, SdkError};
use crate::features::{Feature, FeatureBackend};
use crate::reconciler::ToggleReconciler;
use crate::transport::{MemoryServer, Timed, Transport};
use plateful_core::{UserId, VisitId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Reconciler for a visit toggle (like or save).
pub type VisitReconciler<T> = ToggleReconciler<FeatureBackend<VisitId, Timed<T>>>;

/// Reconciler for following users.
pub type UserReconciler<T> = ToggleReconciler<FeatureBackend<UserId, Timed<T>>>;

/// Configuration for the client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Shared by the like, save and follow reconcilers.
    pub reconciler: ReconcilerConfig,
    /// Deadline applied to every backend request, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(SdkError::InvalidConfig(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        self.reconciler.validate()
    }
}

/// Builder for client configuration.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.config.reconciler.debounce_ms = ms;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.reconciler.max_attempts = attempts;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.reconciler.event_capacity = capacity;
        self
    }

    pub fn request_timeout(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns one reconciler per feature and the event buses they publish to.
///
/// Construct it once at application start and hand clones of the
/// reconcilers to the screens that need them.
///
/// # Example
///
/// ```rust,no_run
/// use plateful_sdk::{Client, ClientConfig, ToggleCallbacks, VisitId};
///
/// # async fn run() -> plateful_sdk::Result<()> {
/// let client = Client::new_with_memory_server(ClientConfig::default())?;
/// let visit = VisitId::new();
///
/// client.likes().toggle(
///     visit,
///     false,
///     ToggleCallbacks::new()
///         .on_optimistic(|liked| println!("heart filled: {}", liked))
///         .on_confirmed(|liked, count| println!("server: {} ({})", liked, count)),
/// );
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport> {
    config: ClientConfig,
    transport: Arc<T>,
    likes: VisitReconciler<T>,
    saves: VisitReconciler<T>,
    follows: UserReconciler<T>,
    visit_events: EventBus<VisitId>,
    user_events: EventBus<UserId>,
}

impl Client<MemoryServer> {
    /// Create a client backed by an in-memory server (for testing).
    pub fn new_with_memory_server(config: ClientConfig) -> Result<Self> {
        Self::new(Arc::new(MemoryServer::new()), config)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client talking to the backend through `transport`.
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let timed = Arc::new(Timed::new(Arc::clone(&transport), config.request_timeout()));
        let visit_events = EventBus::new(config.reconciler.event_capacity);
        let user_events = EventBus::new(config.reconciler.event_capacity);

        let likes = ToggleReconciler::with_bus(
            Feature::Like,
            FeatureBackend::likes(Arc::clone(&timed)),
            config.reconciler.clone(),
            visit_events.clone(),
        );
        let saves = ToggleReconciler::with_bus(
            Feature::Save,
            FeatureBackend::saves(Arc::clone(&timed)),
            config.reconciler.clone(),
            visit_events.clone(),
        );
        let follows = ToggleReconciler::with_bus(
            Feature::Follow,
            FeatureBackend::follows(timed),
            config.reconciler.clone(),
            user_events.clone(),
        );

        Ok(Self {
            config,
            transport,
            likes,
            saves,
            follows,
            visit_events,
            user_events,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn likes(&self) -> &VisitReconciler<T> {
        &self.likes
    }

    pub fn saves(&self) -> &VisitReconciler<T> {
        &self.saves
    }

    pub fn follows(&self) -> &UserReconciler<T> {
        &self.follows
    }

    /// The reconciler serving `feature` on visits, if it is a visit feature.
    pub fn visit_feature(&self, feature: Feature) -> Option<&VisitReconciler<T>> {
        match feature {
            Feature::Like => Some(&self.likes),
            Feature::Save => Some(&self.saves),
            Feature::Follow => None,
        }
    }

    pub fn visit_events(&self) -> &EventBus<VisitId> {
        &self.visit_events
    }

    pub fn user_events(&self) -> &EventBus<UserId> {
        &self.user_events
    }

    /// A visit was deleted: stop syncing its toggles and tell every screen.
    pub fn visit_deleted(&self, id: VisitId) {
        self.likes.forget(&id);
        self.saves.forget(&id);
        self.visit_events.publish_deleted(id);
    }

    /// Drop every pending debounce across all features.
    pub fn shutdown(&self) -> usize {
        let cancelled =
            self.likes.cancel_all() + self.saves.cancel_all() + self.follows.cancel_all();
        debug!(cancelled, "client shut down");
        cancelled
    }
}
