//! Per-user sliding-window submission rate limiting.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use cumulus_core::config::rate_limit::RateLimitConfig;
use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::types::job::JobKind;

/// Counter key: one window per `(user, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CounterKey {
    user: Uuid,
    kind: JobKind,
}

/// One sliding-window counter, reset lazily on the first check after the
/// window passes.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// In-process sliding-window rate limiter.
///
/// State is memory-only by design: the limiter is abuse mitigation, not a
/// correctness guarantee. The DashMap entry lock is the critical section
/// around the check-then-increment sequence.
#[derive(Debug)]
pub struct RateLimiter {
    /// Limiter configuration.
    config: RateLimitConfig,
    /// Live counters.
    counters: DashMap<CounterKey, WindowCounter>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: DashMap::new(),
        }
    }

    /// Check and count one submission. Anonymous/system-issued jobs
    /// (no user) bypass the limiter.
    pub fn check(&self, user: Option<Uuid>, kind: JobKind) -> AppResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(user) = user else {
            return Ok(());
        };

        let now = Utc::now();
        let window = Duration::seconds(self.config.window_seconds as i64);
        let key = CounterKey { user, kind };

        let mut entry = self.counters.entry(key).or_insert(WindowCounter {
            count: 0,
            window_reset_at: now + window,
        });

        if now >= entry.window_reset_at {
            entry.count = 1;
            entry.window_reset_at = now + window;
            return Ok(());
        }

        if entry.count >= self.config.max_per_window {
            return Err(AppError::rate_limited(format!(
                "User {user} exceeded {} {kind} jobs per {}s window",
                self.config.max_per_window, self.config.window_seconds
            )));
        }

        entry.count += 1;
        Ok(())
    }

    /// Evict counters whose window has passed, bounding memory. Returns
    /// the number of counters removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.window_reset_at > now);
        before - self.counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            window_seconds,
            max_per_window: max,
        })
    }

    #[test]
    fn test_rejects_above_max_within_window() {
        let limiter = limiter(3, 3_600);
        let user = Some(Uuid::new_v4());

        for _ in 0..3 {
            assert!(limiter.check(user, JobKind::Thumbnail).is_ok());
        }
        let err = limiter.check(user, JobKind::Thumbnail).unwrap_err();
        assert_eq!(err.kind, cumulus_core::error::ErrorKind::RateLimited);
    }

    #[test]
    fn test_windows_are_per_user_and_per_kind() {
        let limiter = limiter(1, 3_600);
        let alice = Some(Uuid::new_v4());
        let bob = Some(Uuid::new_v4());

        assert!(limiter.check(alice, JobKind::Thumbnail).is_ok());
        assert!(limiter.check(alice, JobKind::Thumbnail).is_err());
        // Other kinds and other users have their own windows.
        assert!(limiter.check(alice, JobKind::VideoTranscode).is_ok());
        assert!(limiter.check(bob, JobKind::Thumbnail).is_ok());
    }

    #[test]
    fn test_anonymous_jobs_bypass() {
        let limiter = limiter(1, 3_600);
        for _ in 0..10 {
            assert!(limiter.check(None, JobKind::Thumbnail).is_ok());
        }
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = limiter(1, 1);
        let user = Some(Uuid::new_v4());

        assert!(limiter.check(user, JobKind::Thumbnail).is_ok());
        assert!(limiter.check(user, JobKind::Thumbnail).is_err());

        std::thread::sleep(std::time::Duration::from_millis(1_100));
        assert!(limiter.check(user, JobKind::Thumbnail).is_ok());
    }

    #[test]
    fn test_sweep_evicts_expired_counters() {
        let limiter = limiter(5, 1);
        let user = Some(Uuid::new_v4());
        limiter.check(user, JobKind::Thumbnail).unwrap();
        assert_eq!(limiter.sweep_expired(), 0);

        std::thread::sleep(std::time::Duration::from_millis(1_100));
        assert_eq!(limiter.sweep_expired(), 1);
    }
}
