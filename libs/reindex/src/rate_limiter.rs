use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use nonzero_ext::nonzero;
use tokio_util::sync::CancellationToken;

use activity_common::AppError;

type Inner = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket gating how fast a re-index run publishes, per §4.5:
/// capacity `2 * rate_limit`, refill rate `rate_limit`/second. `rate_limit
/// == 0` means unlimited -- no limiter is constructed and `wait` never
/// suspends.
pub enum BatchRateLimiter {
    Unlimited,
    Bounded(Inner),
}

impl BatchRateLimiter {
    pub fn new(rate_limit: u32) -> Self {
        let Some(per_second) = NonZeroU32::new(rate_limit) else {
            return Self::Unlimited;
        };
        let burst = NonZeroU32::new(rate_limit.saturating_mul(2)).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self::Bounded(GovernorLimiter::direct(quota))
    }

    /// Wait for `n` tokens (one batch's worth), honoring cancellation. The
    /// limiter only commits state on a successful check, so dropping this
    /// future when cancellation fires first releases nothing extra -- no
    /// reservation was ever held.
    pub async fn wait(&self, n: u32, cancellation: &CancellationToken) -> Result<(), AppError> {
        let Self::Bounded(limiter) = self else {
            return Ok(());
        };
        let Some(n) = NonZeroU32::new(n) else {
            return Ok(());
        };
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(AppError::Cancelled),
            result = limiter.until_n_ready(n) => result.map_err(|e| {
                AppError::Internal(format!(
                    "batch of {n} events exceeds the rate limiter's burst capacity: {e}"
                ))
            }),
        }
    }
}
