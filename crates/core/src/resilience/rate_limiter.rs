//! Sliding-window rate limiting backed by a pluggable key-value store
//!
//! Admission control for inbound work: each client identifier gets a trailing
//! window of admitted-request timestamps, stored under a derived key in any
//! [`CacheStore`] backend. A process-local [`MemoryStore`] gives per-process
//! limits; a shared remote store gives fleet-wide limits with no code change.
//!
//! The window is a true sliding window, not a fixed bucket: every check
//! prunes stamps older than the window before counting, so the limit applies
//! to any trailing interval rather than resetting on bucket boundaries.
//!
//! [`MemoryStore`]: crate::cache::MemoryStore

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::circuit_breaker::{ConfigError, ConfigResult};
use super::clock::{Clock, SystemClock};
use crate::cache::{CacheStore, CacheStoreExt, StoreError};

//==============================================================================
// Configuration
//==============================================================================

/// Configuration for sliding-window rate limiting
///
/// Deserializable from deployment config; the window is written as whole
/// seconds. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per client within the window
    pub limit: u32,
    /// Length of the trailing window
    #[serde(with = "crate::utils::serde::duration_secs")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: 100, window: Duration::from_secs(60) }
    }
}

impl RateLimitConfig {
    /// Create a new configuration builder
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Create a configuration builder (alias for `new()`)
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid {
                message: "limit must be greater than 0".to_string(),
            });
        }

        if self.window.as_secs() == 0 {
            return Err(ConfigError::Invalid {
                message: "window must be at least one second".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for RateLimitConfig
#[derive(Debug)]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self { config: RateLimitConfig::default() }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn build(self) -> ConfigResult<RateLimitConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Sliding Window Limiter
//==============================================================================

/// Sliding-window rate limiter over a pluggable key-value store
///
/// Holds no per-client state of its own: the stored timestamp sequence under
/// `"rate_limit:{client_id}"` is the only shared mutable resource, so any
/// number of limiter instances (or processes, with a shared backend) enforce
/// one combined limit. Entries carry a TTL equal to the window, so idle
/// clients cost nothing once the backend expires them.
///
/// Checks for different clients never contend. Two concurrent checks for the
/// *same* client race on the read-filter-append sequence and may both admit;
/// this slight overshoot is tolerated rather than serialized.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use relayguard_core::cache::MemoryStore;
/// use relayguard_core::resilience::SlidingWindowLimiter;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = SlidingWindowLimiter::new(Arc::new(MemoryStore::new()));
///
/// if limiter.is_rate_limited("client-7", 100, Duration::from_secs(60))? {
///     println!("Too many requests");
/// }
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    store: Arc<dyn CacheStore>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter").finish_non_exhaustive()
    }
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock) }
    }
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter over the given store using the system clock
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store, clock: Arc::new(SystemClock) }
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Prefix for derived store keys
    pub const KEY_PREFIX: &'static str = "rate_limit:";

    /// Create a limiter with a custom clock (useful for testing)
    pub fn with_clock(store: Arc<dyn CacheStore>, clock: C) -> Self {
        Self { store, clock: Arc::new(clock) }
    }

    /// Store key a client's window is kept under
    pub fn window_key(client_id: &str) -> String {
        format!("{}{client_id}", Self::KEY_PREFIX)
    }

    /// Check whether `client_id` is over its limit, recording the request if
    /// admitted
    ///
    /// Reads the client's stamp sequence, drops stamps older than the window,
    /// and compares the fresh count against `limit`. An admitted request
    /// appends the current second and persists the sequence with
    /// TTL = `window`; a rejected request persists nothing, so rejections
    /// never count against future windows.
    ///
    /// Store errors propagate unchanged. `limit == 0` or a sub-second window
    /// admits nothing.
    #[instrument(skip(self))]
    pub fn is_rate_limited(
        &self,
        client_id: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let key = Self::window_key(client_id);
        let stamps: Vec<u64> = self.store.get(&key)?.unwrap_or_default();

        match self.admit(stamps, limit, window) {
            Some(fresh) => {
                self.store.set(&key, &fresh, window)?;
                Ok(false)
            }
            None => {
                debug!(client_id, limit, "Rate limit exceeded, rejecting");
                Ok(true)
            }
        }
    }

    /// Async form of [`is_rate_limited`](Self::is_rate_limited) with
    /// identical semantics
    #[instrument(skip(self))]
    pub async fn is_rate_limited_async(
        &self,
        client_id: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let key = Self::window_key(client_id);
        let stamps: Vec<u64> = self.store.get_async(&key).await?.unwrap_or_default();

        match self.admit(stamps, limit, window) {
            Some(fresh) => {
                self.store.set_async(&key, &fresh, window).await?;
                Ok(false)
            }
            None => {
                debug!(client_id, limit, "Rate limit exceeded, rejecting");
                Ok(true)
            }
        }
    }

    /// Apply the sliding-window decision to a stored stamp sequence
    ///
    /// Returns the pruned sequence with the current second appended when the
    /// request is admitted, or `None` when it is rejected.
    fn admit(&self, stamps: Vec<u64>, limit: u32, window: Duration) -> Option<Vec<u64>> {
        let window_secs = window.as_secs();
        if limit == 0 || window_secs == 0 {
            return None;
        }

        let now = self.clock.secs_since_epoch();
        let mut fresh: Vec<u64> =
            stamps.into_iter().filter(|&t| now.saturating_sub(t) < window_secs).collect();

        if fresh.len() >= limit as usize {
            return None;
        }

        fresh.push(now);
        Some(fresh)
    }
}
