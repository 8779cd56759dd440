//! Runtime configuration for a [`crate::scene::Scene`].
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a scene runtime.
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Number of content-loader worker threads.
    pub max_loader_threads: usize,
    /// Upper bound on route firings in one tick.
    pub max_cascade_steps: usize,
    /// Reject ticks whose timestamp is earlier than the previous one. When `false` such
    /// timestamps are clamped to the previous one and a warning is reported.
    pub reject_time_regression: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_loader_threads: 4,
            max_cascade_steps: 100_000,
            reject_time_regression: true,
        }
    }
}

impl RuntimeConfig {
    /// Creates a new [`RuntimeConfig`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the loader pool size.
    pub fn with_max_loader_threads(mut self, max_loader_threads: usize) -> Self {
        self.max_loader_threads = max_loader_threads;
        self
    }

    /// Sets the per-tick route firing bound.
    pub fn with_max_cascade_steps(mut self, max_cascade_steps: usize) -> Self {
        self.max_cascade_steps = max_cascade_steps;
        self
    }

    pub fn with_reject_time_regression(mut self, reject: bool) -> Self {
        self.reject_time_regression = reject;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_loader_threads == 0 {
            return Err(Error::InvalidConfig("max_loader_threads must be >= 1".into()));
        }
        if self.max_cascade_steps == 0 {
            return Err(Error::InvalidConfig("max_cascade_steps must be >= 1".into()));
        }
        Ok(())
    }
}
