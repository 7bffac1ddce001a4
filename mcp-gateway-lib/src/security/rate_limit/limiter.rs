use ahash::AHashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::{RateLimitConfig, MAX_DURATION_SECS};

const MAX_DURATION: Duration = Duration::from_secs(MAX_DURATION_SECS);

/// Failed-attempt bookkeeping for a single identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Failed attempts in the current window
    pub count: u32,
    /// Start of the current window
    pub first_try: Instant,
    /// Most recent attempt, used by the stale sweep
    pub last_try: Instant,
    /// End of the active lockout, `None` if never locked
    pub locked_until: Option<Instant>,
}

impl AttemptRecord {
    fn new(now: Instant) -> Self {
        Self { count: 0, first_try: now, last_try: now, locked_until: None }
    }

    pub fn is_locked_at(&self, now: Instant) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Per-identity authentication attempt limiter
///
/// Tracks failed authentication attempts per client identity. An identity
/// that fails more than `max_attempts` times within `window` is locked out
/// for `lockout`. Lockouts expire lazily: nothing happens when a lockout
/// ends, the next attempt simply observes it has passed. Window and lockout
/// are capped at one week.
///
/// The decision and the bookkeeping for an attempt happen under one write
/// lock, so concurrent attempts for the same identity are serialized.
pub struct IdentityRateLimiter {
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
    attempts: RwLock<AHashMap<String, AttemptRecord>>,
}

impl IdentityRateLimiter {
    pub fn new(max_attempts: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            max_attempts,
            window: window.min(MAX_DURATION),
            lockout: lockout.min(MAX_DURATION),
            attempts: RwLock::new(AHashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_attempts, config.window(), config.lockout())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout(&self) -> Duration {
        self.lockout
    }

    /// Records an attempt and returns whether the identity may proceed.
    ///
    /// A successful attempt clears the identity's record and always returns
    /// `true`. A failed attempt returns `false` while the identity is locked,
    /// and locks it once the failure count exceeds `max_attempts`.
    pub fn check_and_record(&self, identity: &str, success: bool) -> bool {
        self.check_and_record_at(identity, success, Instant::now())
    }

    /// [`check_and_record`](Self::check_and_record) with an explicit clock
    pub fn check_and_record_at(&self, identity: &str, success: bool, now: Instant) -> bool {
        // The table only holds plain records; a panic elsewhere cannot leave it torn.
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);

        if success {
            attempts.remove(identity);
            return true;
        }

        let record = attempts
            .entry(identity.to_string())
            .or_insert_with(|| AttemptRecord::new(now));

        if record.is_locked_at(now) {
            return false;
        }

        if now.saturating_duration_since(record.first_try) > self.window {
            record.count = 0;
            record.first_try = now;
        }

        record.count = record.count.saturating_add(1);
        record.last_try = now;

        if record.count > self.max_attempts {
            record.locked_until = Some(lockout_deadline(now, self.lockout));
            return false;
        }

        true
    }

    /// Removes records with no activity for longer than the lockout duration.
    /// Returns the number of records removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// [`cleanup`](Self::cleanup) with an explicit clock
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        let before = attempts.len();
        attempts.retain(|_, record| now.saturating_duration_since(record.last_try) <= self.lockout);
        before.saturating_sub(attempts.len())
    }

    /// Copy of the record held for `identity`, if any
    pub fn snapshot(&self, identity: &str) -> Option<AttemptRecord> {
        self.attempts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
    }

    pub fn is_locked(&self, identity: &str) -> bool {
        self.snapshot(identity)
            .is_some_and(|record| record.is_locked_at(Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.attempts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lockout_deadline(now: Instant, lockout: Duration) -> Instant {
    now.checked_add(lockout)
        .or_else(|| now.checked_add(MAX_DURATION))
        .unwrap_or(now)
}

impl Default for IdentityRateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> IdentityRateLimiter {
        IdentityRateLimiter::new(5, Duration::from_secs(60), Duration::from_secs(300))
    }

    #[test]
    fn locked_attempt_does_not_touch_the_record() {
        let limiter = limiter();
        let start = Instant::now();
        for i in 0..6 {
            limiter.check_and_record_at("10.0.0.1", false, start + Duration::from_secs(i));
        }
        let locked = limiter.snapshot("10.0.0.1");

        assert!(!limiter.check_and_record_at("10.0.0.1", false, start + Duration::from_secs(30)));
        assert_eq!(limiter.snapshot("10.0.0.1"), locked);
    }

    #[test]
    fn window_reset_starts_a_new_count() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_and_record_at("id", false, start));
        }

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_and_record_at("id", false, later));
        let record = limiter.snapshot("id");
        assert_eq!(record.map(|r| (r.count, r.first_try)), Some((1, later)));
    }

    #[test]
    fn lockout_expires_lazily() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.check_and_record_at("id", false, start);
        }
        assert!(!limiter.check_and_record_at("id", false, start + Duration::from_secs(299)));

        // Past both the lockout and the window: counting restarts.
        assert!(limiter.check_and_record_at("id", false, start + Duration::from_secs(301)));
        assert_eq!(limiter.snapshot("id").map(|r| r.count), Some(1));
    }

    #[test]
    fn oversized_lockout_is_capped() {
        let limiter = IdentityRateLimiter::new(5, Duration::MAX, Duration::MAX);
        assert_eq!(limiter.lockout(), MAX_DURATION);

        let start = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_and_record_at("id", false, start));
        }
        assert!(!limiter.check_and_record_at("id", false, start));
        let until = limiter.snapshot("id").and_then(|r| r.locked_until);
        assert_eq!(until, Some(start + MAX_DURATION));
    }

    #[test]
    fn unknown_identity_has_no_record() {
        let limiter = limiter();
        assert!(limiter.snapshot("nobody").is_none());
        assert!(!limiter.is_locked("nobody"));
        assert!(limiter.is_empty());
    }
}
