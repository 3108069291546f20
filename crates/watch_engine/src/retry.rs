use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use watch_logging::{watch_debug, watch_warn};

use crate::ApiError;

/// How transient request failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    None,
    /// Same delay before every retry.
    Fixed { retries: u32, delay: Duration },
    /// Delay before retry `k` (0-based) is `min(base * 2^k, max)`.
    CappedExponential {
        retries: u32,
        base: Duration,
        max: Duration,
    },
}

impl RetryPolicy {
    /// Generic client policy for calls outside a watch session.
    pub const fn client_default() -> Self {
        RetryPolicy::Fixed {
            retries: 3,
            delay: Duration::from_secs(1),
        }
    }

    /// Policy for each periodic status request.
    pub const fn status_default() -> Self {
        RetryPolicy::CappedExponential {
            retries: 5,
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }

    /// Policy for the one-shot result request.
    pub const fn result_default() -> Self {
        RetryPolicy::Fixed {
            retries: 3,
            delay: Duration::from_secs(2),
        }
    }

    pub fn max_retries(&self) -> u32 {
        match *self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { retries, .. } | RetryPolicy::CappedExponential { retries, .. } => {
                retries
            }
        }
    }

    /// Delay before retry number `attempt` (0-based), `None` once the budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries() {
            return None;
        }
        match *self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { delay, .. } => Some(delay),
            RetryPolicy::CappedExponential { base, max, .. } => Some(
                2u32.checked_pow(attempt)
                    .and_then(|factor| base.checked_mul(factor))
                    .map_or(max, |delay| delay.min(max)),
            ),
        }
    }
}

/// Runs `op` until it succeeds, fails permanently or the retry budget is spent.
///
/// Both the attempt and the delay between attempts stop as soon as `cancel`
/// fires, returning [`ApiError::Cancelled`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            outcome = op() => outcome,
        };
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_transient() {
            return Err(err);
        }
        let Some(delay) = policy.delay(attempt) else {
            if attempt > 0 {
                watch_warn!("{label}: giving up after {attempt} retries: {err}");
            }
            return Err(err);
        };
        attempt += 1;
        watch_debug!("{label}: {err}; retry {attempt} in {delay:?}");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
