//! Configuration for the parallel runtime.

use std::num::NonZeroUsize;
use std::thread;

/// An invalid runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The worker count was zero.
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Configuration for [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Prefix for worker thread names; the worker index is appended.
    pub thread_name_prefix: String,
}

impl RuntimeConfig {
    /// Creates a configuration with one worker per available core.
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            thread_name_prefix: String::from("bocage-worker-"),
        }
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_workers() {
        assert!(RuntimeConfig::default().workers >= 1);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = RuntimeConfig::new().workers(0);
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = RuntimeConfig::new().workers(2).thread_name_prefix("w");
        assert_eq!(config.workers, 2);
        assert_eq!(config.thread_name_prefix, "w");
        assert!(config.validate().is_ok());
    }
}
