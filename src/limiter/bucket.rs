//! Per-user token bucket.
//!
//! Backed by `governor`'s GCRA limiter, which is a continuous token bucket:
//! the balance refills at `rate` tokens per second on a monotonic clock,
//! capped at `burst`, and every successful check consumes exactly one token.
//! Updates are a single compare-and-swap on an atomic, so concurrent checks
//! for the same user never over-admit.

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Build the quota for `request_limit` tokens per second with `burst` capacity.
///
/// # Errors
///
/// Returns a configuration error if the rate is not a positive finite number,
/// is so large that one token would replenish in under a nanosecond, or is so
/// small that refilling a full burst would overflow governor's nanosecond
/// counter.
pub fn quota(request_limit: f64, burst: NonZeroU32) -> ProxyResult<Quota> {
    if !request_limit.is_finite() || request_limit <= 0.0 {
        return Err(ProxyError::config(
            format!("request limit must be a positive number, got {request_limit}"),
            None,
        ));
    }

    let period = Duration::try_from_secs_f64(request_limit.recip()).map_err(|e| {
        ProxyError::config(
            format!("request limit {request_limit} cannot be represented as a refill period"),
            Some(Box::new(e)),
        )
    })?;

    let full_refill = period
        .checked_mul(burst.get())
        .filter(|d| d.as_nanos() <= u128::from(u64::MAX));
    if full_refill.is_none() {
        return Err(ProxyError::config(
            format!(
                "request limit {request_limit} with burst {burst} is too low to enforce"
            ),
            None,
        ));
    }

    Quota::with_period(period)
        .map(|quota| quota.allow_burst(burst))
        .ok_or_else(|| {
            ProxyError::config(
                format!("request limit {request_limit} is too high to enforce"),
                None,
            )
        })
}

/// Token bucket limiting a single user.
pub struct TokenBucket<C: Clock = DefaultClock> {
    inner: DirectLimiter<C>,
}

impl<C: Clock> TokenBucket<C> {
    /// Create a full bucket driven by `clock`.
    #[must_use]
    pub fn with_clock(quota: Quota, clock: &C) -> Self {
        Self {
            inner: RateLimiter::direct_with_clock(quota, clock),
        }
    }

    /// Take one token if available. Never blocks.
    pub fn allow(&self) -> bool {
        self.inner.check().is_ok()
    }
}

impl TokenBucket<DefaultClock> {
    /// Create a full bucket on the default monotonic clock.
    #[must_use]
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, &DefaultClock::default())
    }
}

impl<C: Clock> std::fmt::Debug for TokenBucket<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;

    fn burst(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
    }

    #[test]
    fn test_burst_then_refill() -> ProxyResult<()> {
        let clock = FakeRelativeClock::default();
        let quota = quota(2.0, burst(5))?;
        let bucket = TokenBucket::with_clock(quota, &clock);

        for i in 0..5 {
            assert!(bucket.allow(), "request {i} should fit in the burst");
        }
        assert!(!bucket.allow(), "sixth immediate request should be denied");

        clock.advance(Duration::from_millis(600));
        assert!(bucket.allow(), "one token should have refilled");
        assert!(!bucket.allow(), "only one token should have refilled");
        Ok(())
    }

    #[test]
    fn test_fractional_refill_accumulates() -> ProxyResult<()> {
        let clock = FakeRelativeClock::default();
        let quota = quota(1.0, burst(1))?;
        let bucket = TokenBucket::with_clock(quota, &clock);
        assert!(bucket.allow());

        // Two partial waits add up to one whole token.
        clock.advance(Duration::from_millis(500));
        assert!(!bucket.allow());
        clock.advance(Duration::from_millis(600));
        assert!(bucket.allow());
        Ok(())
    }

    #[test]
    fn test_balance_capped_at_burst() -> ProxyResult<()> {
        let clock = FakeRelativeClock::default();
        let quota = quota(10.0, burst(3))?;
        let bucket = TokenBucket::with_clock(quota, &clock);

        // A minute idle would be 600 tokens uncapped.
        clock.advance(Duration::from_secs(60));
        let admitted = (0..100).filter(|_| bucket.allow()).count();
        assert!(admitted < 10, "idle time banked {admitted} tokens");
        Ok(())
    }

    #[test]
    fn test_fractional_rate() -> ProxyResult<()> {
        let clock = FakeRelativeClock::default();
        let quota = quota(0.5, burst(1))?;
        let bucket = TokenBucket::with_clock(quota, &clock);
        assert!(bucket.allow());
        clock.advance(Duration::from_millis(1_500));
        assert!(!bucket.allow());
        clock.advance(Duration::from_millis(600));
        assert!(bucket.allow());
        Ok(())
    }

    #[test]
    fn test_quota_rejects_invalid_rates() {
        assert!(quota(0.0, burst(5)).is_err());
        assert!(quota(-1.0, burst(5)).is_err());
        assert!(quota(f64::NAN, burst(5)).is_err());
        assert!(quota(f64::INFINITY, burst(5)).is_err());
        assert!(quota(1e12, burst(5)).is_err());
    }

    #[test]
    fn test_quota_rejects_unrepresentable_refill() {
        assert!(quota(1e-10, burst(5)).is_err());
        assert!(quota(1e-12, burst(1)).is_err());
        assert!(quota(0.1, burst(u32::MAX)).is_err());

        // Slow but representable: one token a day, a week of burst.
        assert!(quota(1.0 / 86_400.0, burst(7)).is_ok());
    }

    #[test]
    fn test_slowest_accepted_quota_does_not_panic() -> ProxyResult<()> {
        let quota = quota(1e-6, burst(5))?;
        let bucket = TokenBucket::new(quota);
        let admitted = (0..10).filter(|_| bucket.allow()).count();
        assert_eq!(admitted, 5);
        Ok(())
    }
}
