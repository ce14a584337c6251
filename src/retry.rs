//! Bounded exponential backoff for remote operations
//!
//! One policy instance is shared by every read, existence-check, and create
//! call in a run. Attempts are 1-indexed; the wait after attempt `n` is
//! `base_delay * 2^(n-1)`. The whole multi-attempt sequence is bounded by a
//! deadline independent of each attempt's own HTTP timeout, and every wait
//! races the run's cancellation token so Ctrl+C never sits out a backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::Error;

/// Ceiling on the whole retry sequence for one logical operation.
const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Clamp on the backoff exponent so large attempt counts cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 20;

/// Retry envelope for one logical remote operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    deadline: Duration,
}

impl RetryPolicy {
    /// Build a policy from run settings with the default 5-minute deadline.
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Override the sequence deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `operation` with retries.
    ///
    /// Returns the first success, `Error::Cancelled` when the deadline or
    /// the token interrupts an in-flight attempt or a backoff wait, and
    /// `Error::Remote` wrapping the last failure once attempts are
    /// exhausted. `label` names the operation in logs and errors.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let deadline = Instant::now() + self.deadline;
        let mut last_err: Option<anyhow::Error> = None;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(format!("{label} aborted before attempt")));
            }

            let outcome = tokio::select! {
                outcome = operation() => outcome,
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled(format!("{label} aborted mid-request")));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::Cancelled(format!(
                        "{label} exceeded its overall deadline"
                    )));
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt < self.max_attempts {
                        let wait = self.backoff_delay(attempt);
                        warn!(
                            "Attempt {} of {} failed for {}, retrying in {:?}: {:#}",
                            attempt, self.max_attempts, label, wait, err
                        );
                        last_err = Some(err);

                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = cancel.cancelled() => {
                                return Err(Error::Cancelled(format!(
                                    "{label} cancelled during retry wait"
                                )));
                            }
                            _ = tokio::time::sleep_until(deadline) => {
                                return Err(Error::Cancelled(format!(
                                    "{label} exceeded its overall deadline during retry wait"
                                )));
                            }
                        }
                    } else {
                        last_err = Some(err);
                    }
                }
            }
        }

        let cause = last_err.unwrap_or_else(|| anyhow::anyhow!("no attempt was made"));
        Err(Error::remote(
            format!("{label} failed after {} attempts", self.max_attempts),
            cause,
        ))
    }

    /// Wait before the attempt following 1-indexed `attempt`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = (attempt - 1).min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}
