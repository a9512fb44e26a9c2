//! Retry with exponential backoff for retryable provider errors.
//!
//! The planning core never retries; this wrapper is how the CLI opts in.

use log::warn;
use stackgraph::{Outputs, ProviderError, Provisioner, ResolvedConfig};
use std::thread;
use std::time::Duration;

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Default backoff with the given number of attempts.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// A provisioner that re-invokes `inner` on retryable errors.
pub struct Retrying<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: Provisioner> Retrying<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl<P: Provisioner> Provisioner for Retrying<P> {
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.apply(name, config) {
                Ok(outputs) => return Ok(outputs),
                Err(e) if !e.retryable || attempt + 1 >= self.config.max_attempts => {
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        "{name}: attempt {}/{} failed: {e}. Retrying in {:.1}s...",
                        attempt + 1,
                        self.config.max_attempts,
                        delay.as_secs_f64()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
