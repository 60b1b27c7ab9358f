//! Bounded exponential backoff shared by authentication and connect.
//!
//! A failed attempt `n` (1-based) waits `base^n` seconds before the next
//! try, so a base of 2 gives 2s, 4s, 8s, 16s, 32s. Once `max_attempts`
//! retries have been spent, the next failure is final.

use std::time::Duration;

use tracing::error;

use crate::error::{KpError, KpResult};
use crate::session::ShutdownSignal;

/// Static description of a backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_secs: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_secs: u64) -> Self {
        Self {
            max_attempts,
            base_delay_secs,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.base_delay_secs.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_MAX_RETRIES,
            crate::constants::DEFAULT_RETRY_BASE_SECS,
        )
    }
}

/// Consecutive-failure counter for one operation.
#[derive(Debug, Clone)]
pub struct Backoff {
    operation: &'static str,
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(operation: &'static str, policy: RetryPolicy) -> Self {
        Self {
            operation,
            policy,
            attempts: 0,
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Retries spent since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures. Called on success and when an operation starts fresh.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Count a failure and return how long to wait before retrying.
    ///
    /// Fails with [`KpError::RetriesExhausted`] once the budget is spent;
    /// the counter is left at the maximum.
    pub fn record_failure(&mut self, cause: &KpError) -> KpResult<Duration> {
        if self.attempts >= self.policy.max_attempts() {
            error!(
                "{} failed after {} attempts, giving up: {cause}",
                self.operation, self.attempts
            );
            return Err(KpError::RetriesExhausted {
                operation: self.operation,
                attempts: self.attempts,
                last_error: cause.to_string(),
            });
        }

        self.attempts += 1;
        Ok(self.policy.delay_for(self.attempts))
    }

    /// Count a failure and sleep out the backoff delay.
    ///
    /// Returns `Err(KpError::ShuttingDown)` if shutdown interrupts the wait.
    pub async fn wait_after_failure(
        &mut self,
        cause: &KpError,
        shutdown: &ShutdownSignal,
    ) -> KpResult<()> {
        let delay = self.record_failure(cause)?;
        error!(
            "{} failed ({cause}), retrying in {}s (attempt {}/{})",
            self.operation,
            delay.as_secs(),
            self.attempts,
            self.policy.max_attempts()
        );

        if shutdown.sleep(delay).await {
            Ok(())
        } else {
            Err(KpError::ShuttingDown)
        }
    }
}
