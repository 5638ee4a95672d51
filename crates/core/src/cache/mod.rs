//! Key-value store contract and reference implementation
//!
//! This module defines the pluggable storage boundary the rest of the crate
//! builds on:
//! - **[`CacheStore`]**: object-safe raw contract — get/set/remove/exists
//!   with per-entry TTL, each in a sync and an async form
//! - **[`CacheStoreExt`]**: blanket typed facade over any store, so callers
//!   exchange serde-typed values instead of raw payloads
//! - **[`MemoryStore`]**: process-local, TTL-aware reference implementation
//!
//! The [`SlidingWindowLimiter`](crate::resilience::SlidingWindowLimiter)
//! uses a store as its only state backing; swap `MemoryStore` for a shared
//! remote backend and the same limiter enforces a fleet-wide limit.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use relayguard_core::cache::{CacheStore, CacheStoreExt, MemoryStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
//!
//! store.set("profile:42", &"cached payload", Duration::from_secs(300))?;
//! let cached: Option<String> = store.get("profile:42")?;
//! assert!(cached.is_some());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod store;

// Re-export store contract types
pub use memory::MemoryStore;
pub use store::{CacheStore, CacheStoreExt, StoreError};
