use std::future::Future;
use std::time::Duration;

use filedeck_store::StoreError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::TransferSettings;

/// Bounded retry with linear backoff: the n-th retry waits `n * retry_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TransferSettings::default())
    }
}

impl From<&TransferSettings> for RetryPolicy {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt failed; `source` is the last failure.
    Exhausted { attempts: u32, source: StoreError },
    /// Cancellation was requested between attempts.
    Cancelled { attempts: u32 },
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.retry_delay.saturating_mul(retry)
    }

    /// Total attempts allowed, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds, attempts run out, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. Cancellation is only
    /// observed between attempts; a running attempt is never interrupted.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts() {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.backoff(attempt);
            warn!(
                op = %label,
                attempt,
                max_attempts = self.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
