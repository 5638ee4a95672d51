//! Key-value store contract shared by all cache backends
//!
//! [`CacheStore`] is the raw, object-safe contract: serialized payloads in
//! and out, per-entry TTL, sync and async forms of every operation. Backends
//! implement only this trait; the blanket [`CacheStoreExt`] extension layers
//! the typed serde facade on top, so callers work with typed values and
//! never see raw bytes.
//!
//! The crate ships one backend, the process-local
//! [`MemoryStore`](super::MemoryStore); remote backends (a shared cache
//! service, for example) live in their own crates and plug in by
//! implementing [`CacheStore`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

//==============================================================================
// Error Types
//==============================================================================

/// Errors surfaced by cache store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// A payload failed to serialize or deserialize at the typed boundary
    #[error("Cache payload serialization failed")]
    Serialization(#[from] serde_json::Error),

    /// The backend itself failed (connection loss, backend fault, ...)
    #[error("Cache backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Create a backend error from any displayable cause
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend { message: message.into() }
    }
}

impl ErrorClassification for StoreError {
    /// Backend faults are usually transient; a malformed payload is not
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Serialization(_) => ErrorSeverity::Error,
            Self::Backend { .. } => ErrorSeverity::Warning,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

//==============================================================================
// Store Contract
//==============================================================================

/// Object-safe key-value store contract with per-entry expiration
///
/// Payloads at this boundary are serialized bytes (JSON, produced by
/// [`CacheStoreExt`]); implementations treat them as opaque. Each operation
/// has a sync and an async form with identical semantics, so the same
/// backend serves blocking and async call sites. Implementations must be
/// safe for concurrent use; per-key atomicity beyond a single get/set is not
/// part of the contract.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the stored payload for `key`, or `None` if absent or expired
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a payload under `key`, expiring after `ttl`
    ///
    /// Overwrites any existing entry, replacing its remaining TTL.
    fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Remove the entry for `key`; removing an absent key is a no-op
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether a live (non-expired) entry exists for `key`
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Async form of [`get_raw`](Self::get_raw)
    async fn get_raw_async(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Async form of [`set_raw`](Self::set_raw)
    async fn set_raw_async(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> Result<(), StoreError>;

    /// Async form of [`remove`](Self::remove)
    async fn remove_async(&self, key: &str) -> Result<(), StoreError>;

    /// Async form of [`exists`](Self::exists)
    async fn exists_async(&self, key: &str) -> Result<bool, StoreError>;
}

//==============================================================================
// Typed Facade
//==============================================================================

/// Typed facade over any [`CacheStore`]
///
/// Blanket-implemented for every store (including `dyn CacheStore`), so
/// callers serialize and deserialize through serde without touching raw
/// payloads. A value that fails to deserialize surfaces as
/// [`StoreError::Serialization`], never as a silent absence.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use relayguard_core::cache::{CacheStore, CacheStoreExt, MemoryStore};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
///
/// store.set("session:42", &vec![1_u64, 2, 3], Duration::from_secs(60))?;
/// let counts: Option<Vec<u64>> = store.get("session:42")?;
/// assert_eq!(counts, Some(vec![1, 2, 3]));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    /// Get and deserialize the value for `key`, or `None` if absent or
    /// expired
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value under `key`, expiring after `ttl`
    fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw(key, payload, ttl)
    }

    /// Async form of [`get`](Self::get)
    async fn get_async<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw_async(key).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Async form of [`set`](Self::set)
    async fn set_async<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw_async(key, payload, ttl).await
    }
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
