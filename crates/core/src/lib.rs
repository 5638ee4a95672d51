//! Resilience and dispatch primitives shared across RelayGuard services.
//!
//! Every network-facing service in the fleet embeds this crate for the
//! cross-cutting behaviors it should not reimplement:
//! - **Circuit breaking**: per-dependency-key breakers that stop cascading
//!   failures ([`resilience::CircuitBreaker`])
//! - **Rate limiting**: sliding-window admission control backed by any
//!   [`cache::CacheStore`] ([`resilience::SlidingWindowLimiter`])
//! - **Event dispatch**: typed in-process publish/subscribe with external
//!   handler resolution ([`messaging::EventBus`])
//! - **Key-value storage**: the store contract plus a TTL-aware in-memory
//!   reference implementation ([`cache::MemoryStore`])
//!
//! The crate emits structured diagnostics through the `tracing` facade; the
//! host process installs its own subscriber. Time-dependent components take
//! a [`resilience::Clock`] so tests can drive timeouts deterministically.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod error;
pub mod messaging;
pub mod resilience;
pub mod utils;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use cache::{CacheStore, CacheStoreExt, MemoryStore, StoreError};
pub use error::{BoxedError, ErrorClassification, ErrorSeverity, ServiceError};
pub use messaging::{
    DynEventHandler, Event, EventBus, EventBusError, EventHandler, EventMetadata, HandlerRegistry,
    HandlerResolver, TypedEventHandler,
};
pub use resilience::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitState, Clock, ConfigError, ConfigResult, MockClock, RateLimitConfig,
    RateLimitConfigBuilder, ResilienceError, ResilienceResult, SlidingWindowLimiter, SystemClock,
};
pub use utils::serde::duration_secs;
