//! Keyed circuit breaker for guarding calls to downstream dependencies
//!
//! One [`CircuitBreaker`] guards any number of dependencies: every call
//! names a key (a downstream service, endpoint, or tenant) and each key gets
//! its own independent breaker entry, created lazily on first use. Entries
//! never interfere with each other; a storm of failures against one key
//! leaves every other key admitting calls.
//!
//! Per key the classic three-state machine applies: `Closed` counts
//! consecutive failures and opens at the configured threshold, `Open`
//! rejects calls until the cool-down elapses, then a single arriving call is
//! admitted as a probe (`HalfOpen`). A successful probe closes the circuit;
//! a failed one reopens it with a fresh cool-down. Any recorded success
//! clears the failure count and closes the circuit, so an in-flight call
//! that wins its race against a trip heals the key immediately.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{ErrorClassification, ErrorSeverity};

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors that can occur in resilience operations
///
/// Generic over the underlying operation error type `E` so the original
/// failure is preserved and callers can still match on it, while the
/// breaker's own short-circuit rejection stays a distinct variant.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit for this key is open; the call was rejected without running
    #[error("Circuit '{key}' is open, rejecting calls (retry in {retry_after:?})")]
    CircuitOpen { key: String, retry_after: Duration },

    /// The underlying operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ErrorClassification for ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// An open circuit is transient; retry once the cool-down elapses. The
    /// wrapped operation's failure is opaque here, so it is not assumed
    /// retryable.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen { .. } => ErrorSeverity::Warning,
            Self::OperationFailed { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            Self::OperationFailed { .. } => None,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

//==============================================================================
// Circuit State
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, a probe request is testing recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

//==============================================================================
// Configuration
//==============================================================================

/// Configuration for circuit breaker behavior
///
/// Deserializable from deployment config; durations are written as whole
/// seconds. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a key's circuit opens
    pub failure_threshold: u32,
    /// Cool-down an open circuit waits before admitting a probe call
    #[serde(with = "crate::utils::serde::duration_secs")]
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, open_timeout: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Create a configuration builder (alias for `new()`)
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.open_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "open_timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Keyed Circuit Breaker
//==============================================================================

/// Point-in-time view of one key's breaker entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Mutable state of a single key, guarded by its own mutex
#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failure_count: u32,
    next_attempt: Instant,
}

/// Keyed circuit breaker guarding calls to downstream dependencies
///
/// Entries are created lazily per key and live for the breaker's lifetime.
/// Each state check and transition locks only the affected key's entry, and
/// the guarded operation itself always runs with no lock held. Clones share
/// the underlying entries, so one breaker can be handed to many tasks.
///
/// Two calls racing an `Open → HalfOpen` transition may both be admitted as
/// probes; this overlap is tolerated rather than serialized.
///
/// # Examples
///
/// ```rust
/// use relayguard_core::resilience::CircuitBreaker;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let breaker = CircuitBreaker::with_defaults();
///
/// let reply = breaker
///     .execute_keyed("billing", || async { Ok::<_, std::io::Error>("pong") })
///     .await?;
/// assert_eq!(reply, "pong");
/// # Ok(())
/// # }
/// ```
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    entries: Arc<DashMap<String, Arc<Mutex<BreakerEntry>>>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("tracked_keys", &self.entries.len())
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using
    /// system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration (convenience
    /// method)
    pub fn with_defaults() -> Self {
        // The default config is statically valid, no validation round-trip
        Self {
            config: CircuitBreakerConfig::default(),
            entries: Arc::new(DashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a circuit breaker configuration using the builder pattern
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Key used by the unkeyed call variants
    pub const DEFAULT_KEY: &'static str = "default";

    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        Ok(Self { config, entries: Arc::new(DashMap::new()), clock: Arc::new(clock) })
    }

    /// Execute an async operation guarded by the default key's circuit
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_keyed(Self::DEFAULT_KEY, operation).await
    }

    /// Execute an async operation guarded by the circuit for `key`
    ///
    /// Checks the key's state first: an open circuit rejects the call with
    /// [`ResilienceError::CircuitOpen`] without invoking the operation. When
    /// admitted, the operation runs with no lock held and its outcome is
    /// recorded against the key afterwards.
    #[instrument(skip(self, operation))]
    pub async fn execute_keyed<F, Fut, T, E>(&self, key: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let entry = self.entry(key);
        if let Err(retry_after) = self.try_acquire(key, &entry) {
            debug!(key, ?retry_after, "Circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen { key: key.to_string(), retry_after });
        }

        match operation().await {
            Ok(value) => {
                self.on_success(key, &entry);
                Ok(value)
            }
            Err(error) => {
                self.on_failure(key, &entry);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Execute a synchronous operation guarded by the default key's circuit
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.call_keyed(Self::DEFAULT_KEY, operation)
    }

    /// Execute a synchronous operation guarded by the circuit for `key`
    ///
    /// Synchronous alternative to [`execute_keyed`](Self::execute_keyed) for
    /// non-async call sites.
    #[instrument(skip(self, operation))]
    pub fn call_keyed<F, T, E>(&self, key: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let entry = self.entry(key);
        if let Err(retry_after) = self.try_acquire(key, &entry) {
            debug!(key, ?retry_after, "Circuit open, rejecting call");
            return Err(ResilienceError::CircuitOpen { key: key.to_string(), retry_after });
        }

        match operation() {
            Ok(value) => {
                self.on_success(key, &entry);
                Ok(value)
            }
            Err(error) => {
                self.on_failure(key, &entry);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Record a successful outcome against `key` without running an
    /// operation through the breaker
    pub fn record_success_for(&self, key: &str) {
        let entry = self.entry(key);
        self.on_success(key, &entry);
    }

    /// Record a failed outcome against `key` without running an operation
    /// through the breaker
    pub fn record_failure_for(&self, key: &str) {
        let entry = self.entry(key);
        self.on_failure(key, &entry);
    }

    /// Get the current state of the default key's circuit
    pub fn state(&self) -> CircuitState {
        self.state_for(Self::DEFAULT_KEY)
    }

    /// Get the current state of the circuit for `key`
    ///
    /// Purely observational: never creates an entry and never performs the
    /// `Open → HalfOpen` transition. Unknown keys report `Closed`.
    pub fn state_for(&self, key: &str) -> CircuitState {
        self.entries.get(key).map_or(CircuitState::Closed, |entry| entry.value().lock().state)
    }

    /// Get a snapshot of the circuit for `key`, or `None` if the key has
    /// never been used
    pub fn snapshot_for(&self, key: &str) -> Option<BreakerSnapshot> {
        self.entries.get(key).map(|entry| {
            let entry = entry.value().lock();
            BreakerSnapshot { state: entry.state, failure_count: entry.failure_count }
        })
    }

    /// Reset the circuit for `key` to closed with a clear failure count
    ///
    /// No-op for keys that have never been used.
    pub fn reset_for(&self, key: &str) {
        if let Some(entry) = self.entries.get(key) {
            let mut entry = entry.value().lock();
            entry.state = CircuitState::Closed;
            entry.failure_count = 0;
            info!(key, "Circuit manually reset to closed");
        }
    }

    /// Fetch or lazily create the entry for `key`
    ///
    /// The fast path is a shard read; insertion goes through the map's entry
    /// API so two racing creators still end up sharing one entry.
    fn entry(&self, key: &str) -> Arc<Mutex<BreakerEntry>> {
        if let Some(entry) = self.entries.get(key) {
            return Arc::clone(entry.value());
        }

        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(BreakerEntry {
                state: CircuitState::Closed,
                failure_count: 0,
                next_attempt: self.clock.now(),
            }))
        });
        Arc::clone(entry.value())
    }

    /// Gate a call through the key's entry
    ///
    /// Returns the remaining cool-down when the circuit is open and not yet
    /// due for a probe. An open circuit whose cool-down has elapsed moves to
    /// half-open and admits the caller as the probe.
    fn try_acquire(&self, key: &str, entry: &Mutex<BreakerEntry>) -> Result<(), Duration> {
        let mut entry = entry.lock();
        match entry.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let now = self.clock.now();
                if now >= entry.next_attempt {
                    entry.state = CircuitState::HalfOpen;
                    debug!(key, "Circuit cool-down elapsed, admitting probe call");
                    Ok(())
                } else {
                    Err(entry.next_attempt.duration_since(now))
                }
            }
        }
    }

    /// Record a success: clear the count and close the circuit
    fn on_success(&self, key: &str, entry: &Mutex<BreakerEntry>) {
        let mut entry = entry.lock();
        entry.failure_count = 0;
        if entry.state != CircuitState::Closed {
            entry.state = CircuitState::Closed;
            info!(key, "Circuit closed after successful call");
        }
    }

    /// Record a failure and trip the circuit when the threshold is reached
    fn on_failure(&self, key: &str, entry: &Mutex<BreakerEntry>) {
        let mut entry = entry.lock();
        match entry.state {
            CircuitState::Closed => {
                entry.failure_count += 1;
                if entry.failure_count >= self.config.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.next_attempt = self.clock.now() + self.config.open_timeout;
                    warn!(
                        key,
                        failures = entry.failure_count,
                        "Circuit opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                entry.failure_count = entry.failure_count.saturating_add(1);
                entry.state = CircuitState::Open;
                entry.next_attempt = self.clock.now() + self.config.open_timeout;
                warn!(key, "Probe call failed, circuit reopened");
            }
            // Stragglers failing while already open must not grow the count
            // past the threshold.
            CircuitState::Open => {}
        }
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
