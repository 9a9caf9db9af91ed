//! Per-user rate limiting.
//!
//! # Components
//!
//! - [`TokenBucket`]: one user's limiter, an immediate allow/deny decision
//! - [`ExclusionPolicy`]: compiled regex exempting users from limiting
//! - [`LimiterCache`]: user to limiter map with lazy creation and idle eviction
//! - [`sweeper`]: background task evicting idle cache entries
//! - [`RateLimitFilter`]: the policy and cache bundled for the HTTP middleware
//!
//! ```text
//! request ──► RateLimitFilter::check(user)
//!                 │
//!                 ├─ ExclusionPolicy::matches ──► Exempt
//!                 │
//!                 └─ LimiterCache::get_or_create ──► TokenBucket::allow
//!                                    ▲                   │
//!                  sweeper::sweep ───┘            Allowed / Denied
//! ```

pub mod bucket;
pub mod cache;
pub mod exclusion;
pub mod sweeper;

pub use bucket::TokenBucket;
pub use cache::LimiterCache;
pub use exclusion::ExclusionPolicy;

use governor::clock::{Clock, DefaultClock};
use governor::Quota;
use std::sync::Arc;

/// Outcome of checking one request against the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The user matched the exclusion pattern; no limiter was consulted.
    Exempt,
    /// A token was taken from the user's bucket.
    Allowed,
    /// The user's bucket is empty.
    Denied,
}

impl Decision {
    /// Whether the request may proceed.
    #[must_use]
    pub const fn is_permitted(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Per-user rate limit state shared by every request of one server.
pub struct RateLimitFilter<C: Clock = DefaultClock> {
    exclusion: ExclusionPolicy,
    cache: Arc<LimiterCache<C>>,
}

impl RateLimitFilter<DefaultClock> {
    /// Create a filter on the default monotonic clock.
    #[must_use]
    pub fn new(quota: Quota, exclusion: ExclusionPolicy) -> Self {
        Self::with_clock(quota, exclusion, DefaultClock::default())
    }
}

impl<C: Clock> RateLimitFilter<C> {
    /// Create a filter whose limiters run on `clock`.
    #[must_use]
    pub fn with_clock(quota: Quota, exclusion: ExclusionPolicy, clock: C) -> Self {
        Self {
            exclusion,
            cache: Arc::new(LimiterCache::with_clock(quota, clock)),
        }
    }

    /// Decide whether `user` may make a request now.
    pub fn check(&self, user: &str) -> Decision {
        if self.exclusion.matches(user) {
            return Decision::Exempt;
        }

        if self.cache.get_or_create(user).allow() {
            Decision::Allowed
        } else {
            Decision::Denied
        }
    }

    /// The limiter cache, shared with the cleanup task.
    #[must_use]
    pub const fn cache(&self) -> &Arc<LimiterCache<C>> {
        &self.cache
    }

    /// The exclusion policy.
    #[must_use]
    pub const fn exclusion(&self) -> &ExclusionPolicy {
        &self.exclusion
    }
}

impl<C: Clock> std::fmt::Debug for RateLimitFilter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitFilter")
            .field("exclusion", &self.exclusion)
            .field("cache", &self.cache)
            .finish()
    }
}
