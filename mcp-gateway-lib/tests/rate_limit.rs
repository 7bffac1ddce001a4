use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mcp_gateway_lib::config::RateLimitConfig;
use mcp_gateway_lib::IdentityRateLimiter;

fn limiter() -> IdentityRateLimiter {
    IdentityRateLimiter::from_config(&RateLimitConfig::default())
}

#[test]
fn sixth_failure_within_window_is_rejected() {
    let limiter = limiter();
    let start = Instant::now();

    for i in 0..5 {
        assert!(
            limiter.check_and_record_at("10.0.0.1", false, start + Duration::from_secs(i * 2)),
            "attempt {} should be allowed",
            i + 1
        );
    }
    assert!(!limiter.check_and_record_at("10.0.0.1", false, start + Duration::from_secs(10)));

    let record = limiter.snapshot("10.0.0.1");
    assert!(record.is_some_and(|r| r.locked_until == Some(start + Duration::from_secs(310))));
}

#[test]
fn identities_are_tracked_independently() {
    let limiter = limiter();
    let now = Instant::now();
    for _ in 0..6 {
        limiter.check_and_record_at("10.0.0.1", false, now);
    }

    assert!(limiter.check_and_record_at("10.0.0.2", false, now));
    assert_eq!(limiter.len(), 2);
}

#[test]
fn lockout_ends_exactly_at_deadline() {
    let limiter = IdentityRateLimiter::new(1, Duration::from_secs(60), Duration::from_secs(300));
    let start = Instant::now();
    limiter.check_and_record_at("a", false, start);
    assert!(!limiter.check_and_record_at("a", false, start));

    let until = start + Duration::from_secs(300);
    assert!(!limiter.check_and_record_at("a", false, until - Duration::from_millis(1)));
    // Past the deadline and the window: fresh window, first failure allowed.
    assert!(limiter.check_and_record_at("a", false, until));
}

#[test]
fn success_clears_history_even_while_locked() {
    let limiter = limiter();
    let now = Instant::now();
    for _ in 0..6 {
        limiter.check_and_record_at("10.0.0.1", false, now);
    }
    assert!(limiter.snapshot("10.0.0.1").is_some_and(|r| r.is_locked_at(now)));

    assert!(limiter.check_and_record_at("10.0.0.1", true, now));
    assert!(limiter.snapshot("10.0.0.1").is_none());
    assert!(limiter.is_empty());
}

#[test]
fn failures_outside_window_start_a_new_count() {
    let limiter = limiter();
    let start = Instant::now();
    for _ in 0..5 {
        limiter.check_and_record_at("10.0.0.1", false, start);
    }

    let later = start + Duration::from_secs(61);
    assert!(limiter.check_and_record_at("10.0.0.1", false, later));
    let record = limiter.snapshot("10.0.0.1");
    assert!(record.is_some_and(|r| r.count == 1 && r.first_try == later));
}

#[test]
fn cleanup_removes_only_stale_records() {
    let limiter = limiter();
    let start = Instant::now();
    limiter.check_and_record_at("stale", false, start);
    limiter.check_and_record_at("fresh", false, start + Duration::from_secs(200));

    let removed = limiter.cleanup_at(start + Duration::from_secs(301));
    assert_eq!(removed, 1);
    assert!(limiter.snapshot("stale").is_none());
    assert!(limiter.snapshot("fresh").is_some());
}

#[test]
fn cleanup_keeps_records_at_the_boundary() {
    let limiter = limiter();
    let start = Instant::now();
    limiter.check_and_record_at("edge", false, start);

    assert_eq!(limiter.cleanup_at(start + Duration::from_secs(300)), 0);
    assert_eq!(limiter.len(), 1);
}

#[test]
fn concurrent_failures_lock_exactly_once() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let limiter = Arc::new(limiter());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                (0..25).filter(|_| limiter.check_and_record("10.0.0.9", false)).count()
            })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        allowed += handle.join().map_err(|_| "worker thread panicked")?;
    }

    assert_eq!(allowed, 5);
    assert!(limiter.is_locked("10.0.0.9"));
    Ok(())
}
