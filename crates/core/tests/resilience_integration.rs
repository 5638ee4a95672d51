//! Integration tests for resilience primitives
//!
//! Exercises the circuit breaker and the sliding-window rate limiter the way
//! a request pipeline does: admission control first, then fault isolation,
//! across concurrent tasks, with deployment configuration sourced from TOML.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relayguard_core::cache::MemoryStore;
use relayguard_core::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, MockClock, RateLimitConfig,
    ResilienceError, SlidingWindowLimiter,
};
use serde::Deserialize;

/// Custom error type for testing
#[derive(Debug, Clone)]
struct TestError {
    message: String,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

fn test_error(message: &str) -> TestError {
    TestError { message: message.to_string() }
}

/// Validates the breaker's full trip/probe/recover cycle under a mock clock.
///
/// This test walks one key through every state transition the breaker
/// defines, confirming rejected calls never reach the wrapped operation and
/// that a successful probe fully heals the key.
///
/// # Test Steps
/// 1. Configure threshold 3 and a 30 second cool-down with a MockClock
/// 2. Fail three calls and verify the circuit opens
/// 3. Verify a call before the cool-down is rejected without executing
/// 4. Advance past the cool-down and verify the next call probes
/// 5. Confirm the successful probe closes the circuit with a zero count
#[tokio::test(flavor = "multi_thread")]
async fn test_breaker_trip_probe_recover_cycle() {
    let clock = MockClock::new();
    let config = CircuitBreakerConfig::new()
        .failure_threshold(3)
        .open_timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build config");
    let breaker = CircuitBreaker::with_clock(config, clock.clone()).expect("Failed to create");

    for _ in 0..3 {
        let result = breaker
            .execute_keyed("billing", || async { Err::<(), _>(test_error("down")) })
            .await;
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
    }
    assert_eq!(breaker.state_for("billing"), CircuitState::Open);

    let invocations = Arc::new(AtomicU32::new(0));
    let invocations_clone = Arc::clone(&invocations);
    clock.advance(Duration::from_secs(29));
    let rejected = breaker
        .execute_keyed("billing", || async move {
            invocations_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>(())
        })
        .await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 0, "Rejected call must not execute");

    clock.advance(Duration::from_secs(1));
    let probed = breaker
        .execute_keyed("billing", || async { Ok::<_, TestError>("recovered") })
        .await;
    assert_eq!(probed.expect("Probe should be admitted"), "recovered");

    let snapshot = breaker.snapshot_for("billing").expect("Key should be tracked");
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

/// Validates exact failure counting under concurrent load on one key.
///
/// Many tasks failing against the same key must not overshoot the threshold
/// through lost updates: the per-key lock serializes outcome recording, so
/// the count stops exactly at the threshold when the circuit opens.
///
/// # Test Steps
/// 1. Configure threshold 5 on a shared breaker
/// 2. Spawn 20 tasks all failing against the same key
/// 3. Await all tasks
/// 4. Verify the circuit converged to Open
/// 5. Verify the failure count equals exactly the threshold
#[tokio::test(flavor = "multi_thread")]
async fn test_breaker_concurrent_failures_converge() {
    let config = CircuitBreakerConfig::new()
        .failure_threshold(5)
        .build()
        .expect("Failed to build config");
    let breaker = CircuitBreaker::new(config).expect("Failed to create");

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let breaker = breaker.clone();
        tasks.push(tokio::spawn(async move {
            let _ = breaker
                .execute_keyed("billing", || async { Err::<(), _>(test_error("down")) })
                .await;
        }));
    }
    for task in tasks {
        task.await.expect("Task should not panic");
    }

    let snapshot = breaker.snapshot_for("billing").expect("Key should be tracked");
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.failure_count, 5, "Count must stop exactly at the threshold");
}

/// Validates key isolation under concurrent mixed traffic.
///
/// A storm of failures against one key must leave every other key closed and
/// admitting calls, since each key owns an independent breaker entry.
///
/// # Test Steps
/// 1. Spawn tasks failing against "billing" and succeeding against
///    "inventory" concurrently
/// 2. Await all tasks
/// 3. Verify "billing" opened and "inventory" stayed closed
#[tokio::test(flavor = "multi_thread")]
async fn test_breaker_keys_do_not_interfere() {
    let config = CircuitBreakerConfig::new()
        .failure_threshold(3)
        .build()
        .expect("Failed to build config");
    let breaker = CircuitBreaker::new(config).expect("Failed to create");

    let mut tasks = Vec::new();
    for i in 0..10 {
        let breaker = breaker.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let _ = breaker
                    .execute_keyed("billing", || async { Err::<(), _>(test_error("down")) })
                    .await;
            } else {
                let _ = breaker
                    .execute_keyed("inventory", || async { Ok::<_, TestError>(()) })
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.expect("Task should not panic");
    }

    assert_eq!(breaker.state_for("billing"), CircuitState::Open);
    assert_eq!(breaker.state_for("inventory"), CircuitState::Closed);
}

/// Validates a three-per-minute window end to end.
///
/// # Test Steps
/// 1. Build a limiter over a MockClock-driven memory store
/// 2. Admit three calls for one client with limit 3, window 60s
/// 3. Verify the fourth call in the same window is limited
/// 4. Advance 60 seconds with no calls
/// 5. Verify a new call is admitted after the window slid
#[tokio::test(flavor = "multi_thread")]
async fn test_limiter_three_per_minute_window() {
    let clock = MockClock::new();
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let limiter = SlidingWindowLimiter::with_clock(store, clock.clone());
    let window = Duration::from_secs(60);

    for _ in 0..3 {
        let limited = limiter
            .is_rate_limited_async("client-1", 3, window)
            .await
            .expect("Check should succeed");
        assert!(!limited, "Calls within the limit should be admitted");
    }

    let limited = limiter.is_rate_limited_async("client-1", 3, window).await.unwrap();
    assert!(limited, "The fourth call within the window should be limited");

    clock.advance_secs(60);
    let limited = limiter.is_rate_limited_async("client-1", 3, window).await.unwrap();
    assert!(!limited, "A call after the window slid should be admitted");
}

/// Validates per-client isolation under concurrent limiter traffic.
///
/// # Test Steps
/// 1. Share one limiter across 8 tasks, each with its own client id
/// 2. Each task performs its full admission budget
/// 3. Verify every task saw all its calls admitted and the next rejected
#[tokio::test(flavor = "multi_thread")]
async fn test_limiter_concurrent_clients_are_independent() {
    let clock = MockClock::new();
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let limiter = SlidingWindowLimiter::with_clock(store, clock);
    let window = Duration::from_secs(60);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let limiter = limiter.clone();
        tasks.push(tokio::spawn(async move {
            let client = format!("client-{i}");
            for _ in 0..2 {
                let limited =
                    limiter.is_rate_limited_async(&client, 2, window).await.expect("Check failed");
                assert!(!limited, "Calls within the budget should be admitted");
            }
            let limited = limiter.is_rate_limited_async(&client, 2, window).await.unwrap();
            assert!(limited, "The call past the budget should be rejected");
        }));
    }
    for task in tasks {
        task.await.expect("Task should not panic");
    }
}

/// Validates the pipeline order the fleet uses: rate limit, then breaker.
///
/// # Test Steps
/// 1. Build a limiter and a breaker sharing nothing
/// 2. Run admitted requests through both and verify success
/// 3. Exhaust the limit and verify rejected requests never reach the breaker
#[tokio::test(flavor = "multi_thread")]
async fn test_pipeline_rate_limit_before_breaker() {
    let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()));
    let breaker = CircuitBreaker::with_defaults();
    let window = Duration::from_secs(60);
    let executed = Arc::new(AtomicU32::new(0));

    for _ in 0..5 {
        if limiter.is_rate_limited_async("client-1", 2, window).await.expect("Check failed") {
            continue;
        }
        let executed = Arc::clone(&executed);
        breaker
            .execute_keyed("downstream", || async move {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await
            .expect("Admitted call should succeed");
    }

    assert_eq!(
        executed.load(Ordering::SeqCst),
        2,
        "Only admitted requests should reach the breaker"
    );
    assert_eq!(breaker.state_for("downstream"), CircuitState::Closed);
}

/// Validates sourcing both configurations from deployment TOML.
///
/// # Test Steps
/// 1. Deserialize a TOML document holding both config sections
/// 2. Verify the parsed values, with durations read as whole seconds
/// 3. Construct both components from the parsed configs and exercise them
#[tokio::test(flavor = "multi_thread")]
async fn test_configs_from_toml() {
    #[derive(Debug, Deserialize)]
    struct ResilienceSettings {
        circuit_breaker: CircuitBreakerConfig,
        rate_limit: RateLimitConfig,
    }

    let settings: ResilienceSettings = toml::from_str(
        r#"
        [circuit_breaker]
        failure_threshold = 2
        open_timeout = 30

        [rate_limit]
        limit = 1
        window = 60
        "#,
    )
    .expect("Settings should deserialize");

    assert_eq!(settings.circuit_breaker.failure_threshold, 2);
    assert_eq!(settings.circuit_breaker.open_timeout, Duration::from_secs(30));
    assert_eq!(settings.rate_limit.limit, 1);
    assert_eq!(settings.rate_limit.window, Duration::from_secs(60));

    let breaker = CircuitBreaker::new(settings.circuit_breaker).expect("Config should validate");
    for _ in 0..2 {
        let _ = breaker
            .execute_keyed("billing", || async { Err::<(), _>(test_error("down")) })
            .await;
    }
    assert_eq!(breaker.state_for("billing"), CircuitState::Open);

    let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()));
    let config = settings.rate_limit;
    assert!(!limiter
        .is_rate_limited_async("client-1", config.limit, config.window)
        .await
        .expect("Check should succeed"));
    assert!(limiter
        .is_rate_limited_async("client-1", config.limit, config.window)
        .await
        .expect("Check should succeed"));
}
