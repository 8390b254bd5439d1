//! End-to-end admission behaviour of the fixed-window limiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gatekeeper::ratelimit::{
    Clock, CounterEntry, ManualClock, ManualScheduler, RateLimitPolicy, RateLimiter,
};

const START: u64 = 1_700_000_000_000;

fn setup() -> (Arc<ManualClock>, RateLimiter) {
    let clock = Arc::new(ManualClock::new(START));
    let limiter = RateLimiter::new(clock.clone());
    (clock, limiter)
}

fn test_policy() -> RateLimitPolicy {
    RateLimitPolicy::new("test", 5, 60).unwrap()
}

#[test]
fn scenario_first_five_calls_admitted() {
    let (_, limiter) = setup();
    let policy = test_policy();

    let remaining: Vec<u32> = (0..5)
        .map(|_| {
            let decision = limiter.check("1.2.3.4", &policy);
            assert!(decision.admitted);
            assert_eq!(decision.retry_after_secs, None);
            decision.remaining
        })
        .collect();

    assert_eq!(remaining, vec![4, 3, 2, 1, 0]);
}

#[test]
fn scenario_sixth_call_rejected_with_retry_after() {
    let (clock, limiter) = setup();
    let policy = test_policy();

    for _ in 0..5 {
        limiter.check("1.2.3.4", &policy);
    }
    clock.advance(Duration::from_millis(12_500));

    let decision = limiter.check("1.2.3.4", &policy);
    assert!(!decision.admitted);
    assert_eq!(decision.remaining, 0);
    // 47.5s left in the window, rounded up
    assert_eq!(decision.retry_after_secs, Some(48));
    assert_eq!(decision.window_reset_at, START + 60_000);
}

#[test]
fn scenario_other_identifier_is_independent() {
    let (_, limiter) = setup();
    let policy = test_policy();

    for _ in 0..6 {
        limiter.check("1.2.3.4", &policy);
    }

    let decision = limiter.check("5.6.7.8", &policy);
    assert!(decision.admitted);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn scenario_fresh_window_after_expiry() {
    let (clock, limiter) = setup();
    let policy = test_policy();

    for _ in 0..6 {
        limiter.check("1.2.3.4", &policy);
    }
    clock.advance(Duration::from_secs(61));

    let decision = limiter.check("1.2.3.4", &policy);
    assert!(decision.admitted);
    assert_eq!(decision.remaining, 4);
    assert_eq!(decision.window_reset_at, clock.now_millis() + 60_000);
}

#[test]
fn scenario_scopes_have_independent_quotas() {
    let (_, limiter) = setup();
    let ai = RateLimitPolicy::new("ai", 5, 60).unwrap();
    let chat = RateLimitPolicy::new("chat", 5, 60).unwrap();

    for _ in 0..5 {
        assert!(limiter.check("1.2.3.4", &ai).admitted);
    }
    assert!(!limiter.check("1.2.3.4", &ai).admitted);

    let decision = limiter.check("1.2.3.4", &chat);
    assert!(decision.admitted);
    assert_eq!(decision.remaining, 4);
}

#[test]
fn quota_bound_holds_for_various_limits() {
    for limit in [1, 2, 7, 20, 100] {
        let (_, limiter) = setup();
        let policy = RateLimitPolicy::new("bound", limit, 60).unwrap();

        let admitted = (0..limit + 10)
            .filter(|_| limiter.check("caller", &policy).admitted)
            .count();
        assert_eq!(admitted, limit as usize, "limit {}", limit);
    }
}

#[test]
fn window_boundary_is_exclusive() {
    let (clock, limiter) = setup();
    let policy = RateLimitPolicy::new("edge", 1, 60).unwrap();

    limiter.check("caller", &policy);
    clock.advance(Duration::from_millis(59_999));
    let decision = limiter.check("caller", &policy);
    assert!(!decision.admitted);
    assert_eq!(decision.retry_after_secs, Some(1));

    clock.advance(Duration::from_millis(1));
    assert!(limiter.check("caller", &policy).admitted);
}

#[test]
fn rejection_does_not_consume_quota() {
    let (clock, limiter) = setup();
    let policy = test_policy();

    for _ in 0..5 {
        limiter.check("1.2.3.4", &policy);
    }
    let before = limiter.peek("1.2.3.4", &policy);

    for _ in 0..10 {
        clock.advance(Duration::from_secs(1));
        assert!(!limiter.check("1.2.3.4", &policy).admitted);
    }

    assert_eq!(before, limiter.peek("1.2.3.4", &policy));
    assert_eq!(
        before,
        Some(CounterEntry {
            count: 5,
            window_reset_at: START + 60_000,
        })
    );
}

#[test]
fn sweeping_does_not_change_decisions() {
    let policy = test_policy();
    let (swept_clock, swept) = setup();
    let (lazy_clock, lazy) = setup();
    let scheduler = ManualScheduler::new();
    swept.start_sweeper(&scheduler, Duration::from_secs(30));

    let steps = [0u64, 10, 20, 30, 55, 61, 62, 90, 125, 126, 127, 128, 129, 130];
    let mut last = 0;
    for step in steps {
        let delta = Duration::from_secs(step - last);
        swept_clock.advance(delta);
        lazy_clock.advance(delta);
        last = step;

        scheduler.run_pending();
        for identifier in ["a", "b"] {
            assert_eq!(
                swept.check(identifier, &policy),
                lazy.check(identifier, &policy),
                "diverged at t={}s for {}",
                step,
                identifier
            );
        }
    }

    swept.shutdown();
    assert_eq!(scheduler.run_pending(), 0);
}

#[test]
fn sweep_bounds_memory_to_active_keys() {
    let (clock, limiter) = setup();
    let policy = test_policy();

    for i in 0..100 {
        limiter.check(&format!("10.0.0.{}", i), &policy);
    }
    assert_eq!(limiter.tracked_keys(), 100);

    clock.advance(Duration::from_secs(60));
    limiter.check("10.0.1.1", &policy);

    assert_eq!(limiter.sweep(), 100);
    assert_eq!(limiter.tracked_keys(), 1);
}

#[test]
fn empty_identifier_is_an_ordinary_key() {
    let (_, limiter) = setup();
    let policy = RateLimitPolicy::new("test", 1, 60).unwrap();

    assert!(limiter.check("", &policy).admitted);
    assert!(!limiter.check("", &policy).admitted);
    assert!(limiter.check(" ", &policy).admitted);
}

#[test]
fn concurrent_checks_admit_exactly_the_limit() {
    let (_, limiter) = setup();
    let policy = RateLimitPolicy::new("burst", 50, 60).unwrap();
    let admitted = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    // 50 admitted + 30 rejected
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..10 {
                    if limiter.check("203.0.113.7", &policy).admitted {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    } else {
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 50);
    assert_eq!(rejected.load(Ordering::SeqCst), 30);
}

#[test]
fn concurrent_checks_at_exact_limit() {
    let (_, limiter) = setup();
    let policy = RateLimitPolicy::new("burst", 16, 60).unwrap();
    let admitted = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                if limiter.check("fresh", &policy).admitted {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 16);
    assert_eq!(limiter.peek("fresh", &policy).map(|e| e.count), Some(16));
}

#[test]
fn concurrent_keys_do_not_interfere() {
    let (_, limiter) = setup();
    let policy = RateLimitPolicy::new("parallel", 10, 60).unwrap();

    std::thread::scope(|scope| {
        for t in 0..8 {
            let limiter = &limiter;
            let policy = &policy;
            scope.spawn(move || {
                let identifier = format!("client-{}", t);
                let admitted = (0..15)
                    .filter(|_| limiter.check(&identifier, policy).admitted)
                    .count();
                assert_eq!(admitted, 10);
            });
        }
    });

    assert_eq!(limiter.tracked_keys(), 8);
}
