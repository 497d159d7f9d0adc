//! Plateful SDK - optimistic toggles for the Plateful client
//!
//! Likes, saves and follows all share one problem: the user taps faster than
//! the network answers. This SDK gives every such toggle the same behavior:
//! the UI flips immediately, rapid taps collapse into one request, at most
//! one request per entity is ever outstanding, and the screen converges to
//! what the server confirms.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use plateful_sdk::{Client, ClientConfig, ToggleCallbacks, VisitId};
//!
//! #[tokio::main]
//! async fn main() -> plateful_sdk::Result<()> {
//!     let client = Client::new_with_memory_server(ClientConfig::default())?;
//!     let visit = VisitId::new();
//!
//!     // Heart shows as not liked; the user taps it.
//!     client.likes().toggle(visit, false, ToggleCallbacks::new());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`debounce`] - Per-entity cancelable delay
//! - [`reconciler`] - The toggle state machine
//! - [`backend`] - Seam to the authoritative server
//! - [`features`] - Like, save and follow endpoints
//! - [`transport`] - Transport abstraction and in-memory server
//! - [`bus`] - Cross-screen fan-out of confirmed changes
//! - [`client`] - Composition root
//! - [`config`] - Tuning knobs
//! - [`error`] - Error types

pub mod backend;
pub mod bus;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod features;
pub mod reconciler;
pub mod transport;

// Re-exports for convenience
pub use backend::{ToggleAck, ToggleBackend, ToggleOutcome};
pub use bus::{EntityEvent, EventBus};
pub use client::{Client, ClientConfig, ClientConfigBuilder, UserReconciler, VisitReconciler};
pub use config::{ReconcilerConfig, ReconcilerConfigBuilder};
pub use debounce::DebounceTimer;
pub use error::{BackendError, Result, SdkError, SyncError};
pub use features::{Feature, FeatureBackend};
pub use reconciler::{ToggleCallbacks, ToggleReconciler};
pub use transport::{MemoryServer, Timed, Transport, WireCall};

pub use plateful_core::{EntityId, TogglePhase, ToggleSnapshot, UserId, VisitId};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{Client, ClientConfig};
    pub use crate::error::{BackendError, SyncError};
    pub use crate::features::Feature;
    pub use crate::reconciler::{ToggleCallbacks, ToggleReconciler};
    pub use crate::transport::{MemoryServer, Transport};
    pub use plateful_core::{TogglePhase, ToggleSnapshot, UserId, VisitId};
}
