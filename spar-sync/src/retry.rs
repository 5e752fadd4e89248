//! Timeouts and exponential backoff for backend calls.
//!
//! Every backend call goes through [`RetryPolicy::once`] (timeout only) or
//! [`RetryPolicy::retrying`] (timeout + backoff, idempotent calls only).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use spar_core::DeployConfig;

use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout: config.request_timeout(),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Run `call` once under the per-attempt timeout.
    pub async fn once<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        match tokio::time::timeout(self.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                op,
                after: self.timeout,
            }),
        }
    }

    /// Run `call` with the timeout, retrying retryable failures with backoff.
    pub async fn retrying<T, F, Fut>(
        &self,
        op: &'static str,
        key: &str,
        mut call: F,
    ) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            match self.once(op, &mut call).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        op,
                        key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying backend call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
