//! Retry policy for transient failures.

use std::time::Duration;

use tracing::warn;

use ydb_c_core::DriverConfig;

use crate::driver::Driver;
use crate::status::{Backoff, OperationResult};

/// Backoff doubles per attempt up to this exponent.
const MAX_BACKOFF_EXPONENT: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub fast_backoff: Duration,
    pub slow_backoff: Duration,
}

impl RetrySettings {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            fast_backoff: Duration::from_millis(config.fast_backoff_ms),
            slow_backoff: Duration::from_millis(config.slow_backoff_ms),
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn delay(&self, backoff: Backoff, attempt: u32) -> Duration {
        let base = match backoff {
            Backoff::Fast => self.fast_backoff,
            Backoff::Slow => self.slow_backoff,
        };
        base.saturating_mul(1 << attempt.min(MAX_BACKOFF_EXPONENT))
    }
}

/// Run `op` until it succeeds, fails with a final status, or the retry
/// budget is spent. `op` receives the zero-based attempt number.
pub fn retry_operation<T>(
    driver: &Driver,
    settings: &RetrySettings,
    what: &str,
    mut op: impl FnMut(u32) -> OperationResult<T>,
) -> OperationResult<T> {
    let mut attempt = 0;
    loop {
        let err = match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let Some(backoff) = err.status.retry_backoff() else {
            return Err(err);
        };
        if attempt >= settings.max_retries {
            warn!(operation = what, attempts = attempt + 1, error = %err, "retries exhausted");
            return Err(err);
        }

        let delay = settings.delay(backoff, attempt);
        warn!(
            operation = what,
            attempt = attempt + 1,
            max_retries = settings.max_retries,
            status = ?err.status,
            delay_ms = delay.as_millis() as u64,
            "transient failure, retrying"
        );
        driver.sleep(delay);
        attempt += 1;
    }
}
