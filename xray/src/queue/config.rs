//! Reasoning queue configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backoff::{table_delay, JitterStrategy};
use crate::errors::{Result, XRayError};

/// Configuration for the reasoning queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of concurrent generator calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Maximum number of attempts per job, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay in milliseconds before retrying, indexed by the failed attempt.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,
    /// Logs every job transition.
    #[serde(default)]
    pub debug: bool,
    /// Turns a stalled generator call into a retryable timeout.
    #[serde(default)]
    pub generator_timeout_ms: Option<u64>,
    /// Jitter applied to retry delays.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

fn default_concurrency() -> usize {
    3
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_delays() -> Vec<u64> {
    vec![1000, 2000, 4000, 8000]
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_delays_ms: default_retry_delays(),
            debug: false,
            generator_timeout_ms: None,
            jitter: JitterStrategy::None,
        }
    }
}

impl QueueConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the retry delay table.
    #[must_use]
    pub fn with_retry_delays_ms(mut self, delays: impl Into<Vec<u64>>) -> Self {
        self.retry_delays_ms = delays.into();
        self
    }

    /// Enables verbose transition logging.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the generator timeout.
    #[must_use]
    pub fn with_generator_timeout(mut self, timeout: Duration) -> Self {
        self.generator_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Rejects configurations the queue cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(XRayError::config("concurrency must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(XRayError::config("max_retries must be at least 1"));
        }
        if self.retry_delays_ms.is_empty() {
            return Err(XRayError::config("retry_delays_ms must not be empty"));
        }
        Ok(())
    }

    /// Returns the backoff before retrying after `failed_attempt` failed.
    #[must_use]
    pub fn delay_for_attempt(&self, failed_attempt: u32) -> Duration {
        self.jitter
            .apply(table_delay(&self.retry_delays_ms, failed_attempt))
    }

    /// Gets the generator timeout as a Duration.
    #[must_use]
    pub fn generator_timeout(&self) -> Option<Duration> {
        self.generator_timeout_ms.map(Duration::from_millis)
    }
}
