//! Resilience patterns protecting services from cascading failure and
//! overload
//!
//! This module provides **generic, reusable** resilience primitives:
//! - **Circuit Breaker**: per-key state machines that stop calling failing
//!   dependencies and probe for recovery ([`CircuitBreaker`])
//! - **Rate Limiting**: sliding-window admission control per client
//!   identifier, backed by any key-value store ([`SlidingWindowLimiter`])
//! - **Clock abstraction**: injectable time source so cool-downs and windows
//!   are testable without sleeping ([`Clock`], [`MockClock`])
//!
//! The two primitives do not call each other; the request pipeline invokes
//! them in a fixed order (rate limit, then circuit breaker, then the handler
//! itself). Both are generic over the caller's error type and clock, and
//! both tolerate a narrow documented race rather than take coarse locks —
//! see the type-level docs.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use relayguard_core::cache::MemoryStore;
//! use relayguard_core::resilience::{CircuitBreaker, SlidingWindowLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()));
//! let breaker = CircuitBreaker::with_defaults();
//!
//! if limiter.is_rate_limited_async("client-7", 100, Duration::from_secs(60)).await? {
//!     return Ok(()); // reject before doing any work
//! }
//!
//! let reply = breaker
//!     .execute_keyed("billing", || async { Ok::<_, std::io::Error>("pong") })
//!     .await?;
//! assert_eq!(reply, "pong");
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod clock;
pub mod rate_limiter;

// Re-export circuit breaker types
pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitState, ConfigError, ConfigResult, ResilienceError, ResilienceResult,
};
// Re-export clock types
pub use clock::{Clock, MockClock, SystemClock};
// Re-export rate limiter types
pub use rate_limiter::{RateLimitConfig, RateLimitConfigBuilder, SlidingWindowLimiter};
