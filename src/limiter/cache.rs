//! Per-user limiter cache with idle eviction.
//!
//! One map from user name to limiter, guarded by a single mutex. The request
//! path only ever inserts or refreshes entries through
//! [`LimiterCache::get_or_create`]; entries are removed exclusively by
//! [`LimiterCache::sweep`], which the cleanup task runs periodically.
//!
//! Both operations take the same lock, so a lookup never observes an entry
//! that is half way through eviction. Lookups hold it for one map lookup and
//! a timestamp write; a sweep holds it for one pass over the map.

use governor::clock::{Clock, DefaultClock, Reference};
use governor::Quota;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::bucket::TokenBucket;

struct LimiterEntry<C: Clock> {
    limiter: Arc<TokenBucket<C>>,
    last_seen: C::Instant,
}

/// Map of user name to token bucket.
pub struct LimiterCache<C: Clock = DefaultClock> {
    quota: Quota,
    clock: C,
    limiters: Mutex<HashMap<String, LimiterEntry<C>>>,
}

impl LimiterCache<DefaultClock> {
    /// Create an empty cache handing out limiters with `quota`.
    #[must_use]
    pub fn new(quota: Quota) -> Self {
        Self::with_clock(quota, DefaultClock::default())
    }
}

impl<C: Clock> LimiterCache<C> {
    /// Create an empty cache whose limiters and timestamps use `clock`.
    #[must_use]
    pub fn with_clock(quota: Quota, clock: C) -> Self {
        Self {
            quota,
            clock,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Return the limiter for `user`, creating a full one on first sight.
    ///
    /// Always marks the user as seen now, whether or not the caller's request
    /// ends up being allowed.
    pub fn get_or_create(&self, user: &str) -> Arc<TokenBucket<C>> {
        let mut limiters = self.limiters.lock();
        let now = self.clock.now();

        if let Some(entry) = limiters.get_mut(user) {
            entry.last_seen = now;
            return Arc::clone(&entry.limiter);
        }

        debug!(user, "creating limiter for user");
        let limiter = Arc::new(TokenBucket::with_clock(self.quota, &self.clock));
        limiters.insert(
            user.to_owned(),
            LimiterEntry {
                limiter: Arc::clone(&limiter),
                last_seen: now,
            },
        );
        limiter
    }

    /// Drop every entry idle for longer than `idle_threshold`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        let mut limiters = self.limiters.lock();
        let now = self.clock.now();
        let before = limiters.len();

        limiters.retain(|user, entry| {
            let idle = Duration::from(now.duration_since(entry.last_seen));
            if idle > idle_threshold {
                info!(user = %user, idle_secs = idle.as_secs(), "removing limiter for user");
                false
            } else {
                true
            }
        });

        before - limiters.len()
    }

    /// Number of users currently tracked.
    pub fn len(&self) -> usize {
        self.limiters.lock().len()
    }

    /// Whether no users are tracked.
    pub fn is_empty(&self) -> bool {
        self.limiters.lock().is_empty()
    }

    /// Whether `user` currently has a limiter.
    pub fn contains(&self, user: &str) -> bool {
        self.limiters.lock().contains_key(user)
    }

    /// The quota new limiters are created with.
    #[must_use]
    pub const fn quota(&self) -> Quota {
        self.quota
    }
}

impl<C: Clock> std::fmt::Debug for LimiterCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterCache")
            .field("quota", &self.quota)
            .field("users", &self.len())
            .finish_non_exhaustive()
    }
}
