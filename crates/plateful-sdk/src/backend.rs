//! The seam between the reconciler and the authoritative server.

use crate::error::BackendError;
use async_trait::async_trait;
use plateful_core::EntityId;
use serde::{Deserialize, Serialize};

/// A decoded server answer to a "set state" request.
pub trait ToggleAck {
    /// The state the server now holds.
    fn state(&self) -> bool;
    /// The authoritative counter that goes with it.
    fn count(&self) -> u64;
}

/// Feature-agnostic `{state, count}` answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub state: bool,
    pub count: u64,
}

impl ToggleOutcome {
    pub fn new(state: bool, count: u64) -> Self {
        Self { state, count }
    }
}

impl ToggleAck for ToggleOutcome {
    fn state(&self) -> bool {
        self.state
    }

    fn count(&self) -> u64 {
        self.count
    }
}

/// An idempotent "set state" endpoint for one kind of toggle.
///
/// Implementations must send the absolute desired state. A relative "flip"
/// diverges from the user's intent as soon as a request is delayed or
/// duplicated.
#[async_trait]
pub trait ToggleBackend: Send + Sync + 'static {
    type Id: EntityId;
    type Ack: ToggleAck + Send;

    async fn set_state(&self, id: &Self::Id, desired_state: bool)
        -> Result<Self::Ack, BackendError>;
}
