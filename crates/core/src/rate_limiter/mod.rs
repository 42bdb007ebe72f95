//! Per-museum request pacing.
//!
//! Each museum gets one [`IntervalLimiter`] holding the earliest instant at
//! which the next request may be issued. Every grant advances that cursor by
//! the configured interval under a lock, so concurrent workers sharing a
//! museum are serialized to the configured cadence no matter how wide the
//! worker pool is.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

use crate::artwork::MuseumTag;
use crate::config::duration_from_secs;

/// Rate limit status for a museum.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub interval: Duration,
    /// Time until the next request slot opens, `None` if one is free now.
    pub next_available_in: Option<Duration>,
}

/// Minimum-interval gate for a single museum.
#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    next_allowed: Mutex<Instant>,
}

impl IntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Mutex::new(Instant::now()),
        }
    }

    /// Build from a requests-per-second budget. Non-positive rates disable pacing.
    pub fn per_second(requests_per_second: f64) -> Self {
        if requests_per_second > 0.0 {
            Self::new(duration_from_secs(1.0 / requests_per_second))
        } else {
            Self::new(Duration::ZERO)
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserve the next slot and wait for it.
    ///
    /// The reservation happens under the lock; the wait does not, so other
    /// callers can queue their own (later) slots meanwhile.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_allowed.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }

    pub async fn status(&self) -> RateLimitStatus {
        let next = *self.next_allowed.lock().await;
        let now = Instant::now();
        RateLimitStatus {
            interval: self.interval,
            next_available_in: (next > now).then(|| next - now),
        }
    }
}

/// Rate limit configuration for one museum.
#[derive(Debug, Clone)]
pub struct MuseumRateLimit {
    pub museum: MuseumTag,
    pub interval: Duration,
}

/// Pool of limiters, one per museum, fixed at construction.
#[derive(Debug, Default)]
pub struct RateLimiterPool {
    limiters: HashMap<MuseumTag, Arc<IntervalLimiter>>,
}

impl RateLimiterPool {
    pub fn new(limits: &[MuseumRateLimit]) -> Self {
        let limiters = limits
            .iter()
            .map(|l| (l.museum, Arc::new(IntervalLimiter::new(l.interval))))
            .collect();
        Self { limiters }
    }

    /// A pool that never waits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wait until a request to `museum` is permitted.
    ///
    /// Museums without a configured limit pass straight through.
    pub async fn acquire(&self, museum: MuseumTag) {
        match self.limiters.get(&museum) {
            Some(limiter) => limiter.acquire().await,
            None => debug!(museum = %museum, "no rate limit configured, not pacing"),
        }
    }

    /// Shared handle to a museum's limiter, if configured.
    pub fn limiter(&self, museum: MuseumTag) -> Option<Arc<IntervalLimiter>> {
        self.limiters.get(&museum).cloned()
    }

    pub fn has_museum(&self, museum: MuseumTag) -> bool {
        self.limiters.contains_key(&museum)
    }

    pub async fn status(&self, museum: MuseumTag) -> Option<RateLimitStatus> {
        match self.limiters.get(&museum) {
            Some(limiter) => Some(limiter.status().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(museum: MuseumTag, interval: Duration) -> Arc<RateLimiterPool> {
        Arc::new(RateLimiterPool::new(&[MuseumRateLimit { museum, interval }]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_spaced_by_interval() {
        let pool = pool_with(MuseumTag::Aic, Duration::from_millis(500));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                pool.acquire(MuseumTag::Aic).await;
                Instant::now()
            }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        assert!(start.elapsed() >= Duration::from_millis(4500));
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let pool = pool_with(MuseumTag::Met, Duration::from_secs(1));
        let start = Instant::now();
        pool.acquire(MuseumTag::Met).await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_museums_are_independent() {
        let pool = Arc::new(RateLimiterPool::new(&[
            MuseumRateLimit {
                museum: MuseumTag::Aic,
                interval: Duration::from_secs(2),
            },
            MuseumRateLimit {
                museum: MuseumTag::Cma,
                interval: Duration::from_secs(2),
            },
        ]));
        let start = Instant::now();
        pool.acquire(MuseumTag::Aic).await;
        pool.acquire(MuseumTag::Cma).await;
        assert!(start.elapsed() < Duration::from_secs(1));

        pool.acquire(MuseumTag::Aic).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_museum_passes_through() {
        let pool = RateLimiterPool::empty();
        let start = Instant::now();
        for _ in 0..5 {
            pool.acquire(MuseumTag::Cma).await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
        assert!(!pool.has_museum(MuseumTag::Cma));
        assert!(pool.status(MuseumTag::Cma).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_next_slot() {
        let pool = pool_with(MuseumTag::Aic, Duration::from_secs(1));
        let status = pool.status(MuseumTag::Aic).await.unwrap();
        assert!(status.next_available_in.is_none());

        pool.acquire(MuseumTag::Aic).await;
        let status = pool.status(MuseumTag::Aic).await.unwrap();
        assert_eq!(status.interval, Duration::from_secs(1));
        assert!(status.next_available_in.is_some());
    }

    #[test]
    fn test_per_second_interval() {
        let limiter = IntervalLimiter::per_second(2.0);
        assert_eq!(limiter.interval(), Duration::from_millis(500));
        assert_eq!(IntervalLimiter::per_second(0.0).interval(), Duration::ZERO);
        assert_eq!(
            IntervalLimiter::per_second(1e-300).interval(),
            Duration::from_secs(365 * 24 * 60 * 60)
        );
    }
}
