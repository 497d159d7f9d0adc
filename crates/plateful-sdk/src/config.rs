//! Tuning knobs for the toggle reconciler.

use crate::error::{Result, SdkError};
use std::time::Duration;

/// Quiet period that must elapse after the last tap before syncing.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Total attempts (first send plus retries) when the server disagrees.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configuration for a single reconciler instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
    /// Maximum requests per sync cycle while the server disagrees.
    pub max_attempts: u32,
    /// Buffer size of the event bus channel.
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            event_capacity: 100,
        }
    }
}

impl ReconcilerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SdkError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SdkError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for reconciler configuration.
pub struct ReconcilerConfigBuilder {
    config: ReconcilerConfig,
}

impl ReconcilerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReconcilerConfig::default(),
        }
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> ReconcilerConfig {
        self.config
    }
}

impl Default for ReconcilerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
