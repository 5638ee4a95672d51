//! Process-local, TTL-aware reference store
//!
//! [`MemoryStore`] backs the [`CacheStore`](super::CacheStore) contract with
//! a concurrent in-process map. It exists so the rate limiter (and any other
//! store consumer) can run with no external backend: tests, single-process
//! deployments, and local development all use it as-is.
//!
//! Expiry is lazy: an entry past its deadline is dropped the first time a
//! read or existence check touches it, and [`purge_expired`] offers an
//! explicit sweep for hosts that want to bound idle memory.
//!
//! [`purge_expired`]: MemoryStore::purge_expired

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::store::{CacheStore, StoreError};
use crate::resilience::{Clock, SystemClock};

/// A stored payload with its expiry deadline
#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-memory key-value store with per-entry TTL
///
/// Entries live in a concurrent map, so operations on different keys never
/// contend. Clones share the underlying map. The clock is injectable, which
/// lets tests expire entries by advancing a
/// [`MockClock`](crate::resilience::MockClock) instead of sleeping.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use relayguard_core::cache::{CacheStore, CacheStoreExt, MemoryStore};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.set("greeting", &"hello", Duration::from_secs(60))?;
/// assert!(store.exists("greeting")?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: Arc<DashMap<String, StoredEntry>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for MemoryStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore").field("entries", &self.entries.len()).finish()
    }
}

impl<C: Clock> Clone for MemoryStore<C> {
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries), clock: Arc::clone(&self.clock) }
    }
}

impl MemoryStore<SystemClock> {
    /// Create an empty store using the system clock
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::new()), clock: Arc::new(SystemClock) }
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Create an empty store with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Arc::new(DashMap::new()), clock: Arc::new(clock) }
    }

    /// Number of entries currently held, including not-yet-swept expired
    /// ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Sweep out expired entries, returning how many were removed
    ///
    /// Lazy expiry already hides expired entries from readers; this sweep
    /// reclaims their memory for keys nothing reads anymore.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        // Counted inside the sweep: concurrent inserts can grow the map
        // while retain walks it, so before/after length deltas are not
        // reliable.
        let mut removed = 0_usize;
        self.entries.retain(|_, entry| {
            if entry.expires_at <= now {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Read the live entry for `key`, dropping it if expired
    ///
    /// The read guard is released before removal; `remove_if` re-checks the
    /// deadline so a concurrent overwrite with a fresh TTL survives.
    fn live_entry(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > self.clock.now() {
                return Some(entry.payload.clone());
            }
        }

        let now = self.clock.now();
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }
}

#[async_trait]
impl<C: Clock> CacheStore for MemoryStore<C> {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.live_entry(key))
    }

    fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let entry = StoredEntry { payload: value, expires_at: self.clock.now() + ttl };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_entry(key).is_some())
    }

    async fn get_raw_async(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_raw(key)
    }

    async fn set_raw_async(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.set_raw(key, value, ttl)
    }

    async fn remove_async(&self, key: &str) -> Result<(), StoreError> {
        self.remove(key)
    }

    async fn exists_async(&self, key: &str) -> Result<bool, StoreError> {
        self.exists(key)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-memory store
    //!
    //! Tests cover typed round-trips, lazy TTL expiry under a mock clock,
    //! overwrite semantics, removal, the purge sweep, shared clones, and the
    //! async delegation.

    use super::*;
    use crate::cache::CacheStoreExt;
    use crate::resilience::MockClock;

    /// Validates `MemoryStore::new` behavior for the empty store scenario.
    ///
    /// Assertions:
    /// - Ensures `store.is_empty()` evaluates to true.
    /// - Confirms `store.get_raw("missing")` equals `Ok(None)`.
    /// - Confirms `store.exists("missing")` equals `Ok(false)`.
    #[test]
    fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.get_raw("missing").unwrap().is_none());
        assert!(!store.exists("missing").unwrap());
    }

    /// Tests a typed set/get round-trip through the extension facade
    #[test]
    fn test_typed_round_trip() {
        let store = MemoryStore::new();

        store
            .set("window", &vec![10_u64, 20, 30], Duration::from_secs(60))
            .expect("Set should succeed");

        let value: Option<Vec<u64>> = store.get("window").expect("Get should succeed");
        assert_eq!(value, Some(vec![10, 20, 30]));
        assert!(store.exists("window").unwrap());
    }

    /// Tests that entries expire lazily: visible before the TTL, gone to
    /// both `get` and `exists` after it
    #[test]
    fn test_ttl_expiry() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set("session", &"alive", Duration::from_secs(30)).expect("Set should succeed");

        clock.advance_secs(29);
        assert!(store.exists("session").unwrap(), "Entry should live until its TTL");

        clock.advance_secs(1);
        let value: Option<String> = store.get("session").unwrap();
        assert!(value.is_none(), "Entry should be gone at the TTL boundary");
        assert!(!store.exists("session").unwrap());
    }

    /// Tests that overwriting an entry replaces both payload and TTL
    #[test]
    fn test_overwrite_replaces_ttl() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set("key", &1_u64, Duration::from_secs(10)).unwrap();
        clock.advance_secs(9);
        store.set("key", &2_u64, Duration::from_secs(10)).unwrap();

        // The original deadline has passed but the overwrite renewed it.
        clock.advance_secs(5);
        let value: Option<u64> = store.get("key").unwrap();
        assert_eq!(value, Some(2));
    }

    /// Validates `remove` behavior for the removal scenario.
    ///
    /// Assertions:
    /// - Confirms the entry is gone after removal.
    /// - Ensures removing an absent key is a no-op.
    #[test]
    fn test_remove() {
        let store = MemoryStore::new();
        store.set("key", &1_u64, Duration::from_secs(60)).unwrap();

        store.remove("key").expect("Remove should succeed");
        assert!(!store.exists("key").unwrap());

        store.remove("key").expect("Removing an absent key should be a no-op");
    }

    /// Tests that the purge sweep reclaims only expired entries
    #[test]
    fn test_purge_expired() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set("short", &1_u64, Duration::from_secs(10)).unwrap();
        store.set("long", &2_u64, Duration::from_secs(100)).unwrap();
        clock.advance_secs(50);

        assert_eq!(store.purge_expired(), 1, "Only the expired entry should be swept");
        assert_eq!(store.len(), 1);
        assert!(store.exists("long").unwrap());
    }

    /// Tests that the sweep runs safely alongside concurrent writers and
    /// counts only what it actually removed, even when inserts land while
    /// the sweep walks the map
    #[test]
    fn test_purge_expired_during_writes() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        for i in 0..64_u64 {
            store.set(&format!("stale:{i}"), &i, Duration::from_secs(1)).unwrap();
        }
        clock.advance_secs(10);

        let writers: Vec<_> = (0..4_u64)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200_u64 {
                        store
                            .set(&format!("live:{w}:{i}"), &i, Duration::from_secs(60))
                            .expect("Set should succeed");
                    }
                })
            })
            .collect();

        let mut removed = 0;
        for _ in 0..50 {
            removed += store.purge_expired();
        }
        for writer in writers {
            writer.join().expect("Writer should not panic");
        }
        removed += store.purge_expired();

        assert_eq!(removed, 64, "Sweeps should count exactly the stale entries");
        assert_eq!(store.len(), 800, "Live entries written during sweeps must survive");
    }

    /// Validates `clear` behavior for the clear scenario.
    ///
    /// Assertions:
    /// - Ensures `store.is_empty()` evaluates to true after clearing.
    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.set("a", &1_u64, Duration::from_secs(60)).unwrap();
        store.set("b", &2_u64, Duration::from_secs(60)).unwrap();

        store.clear();
        assert!(store.is_empty());
    }

    /// Tests that clones share the underlying entries
    #[test]
    fn test_clone_shares_entries() {
        let store = MemoryStore::new();
        let clone = store.clone();

        store.set("key", &7_u64, Duration::from_secs(60)).unwrap();
        let value: Option<u64> = clone.get("key").unwrap();
        assert_eq!(value, Some(7));
    }

    /// Tests that the async operations mirror the sync ones
    #[tokio::test]
    async fn test_async_delegation() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set_async("key", &5_u64, Duration::from_secs(30)).await.expect("Set should succeed");
        assert!(store.exists_async("key").await.unwrap());

        let value: Option<u64> = store.get_async("key").await.unwrap();
        assert_eq!(value, Some(5));

        store.remove_async("key").await.expect("Remove should succeed");
        assert!(!store.exists_async("key").await.unwrap());
    }
}
