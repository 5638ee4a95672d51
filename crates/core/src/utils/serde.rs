//! Serialization utilities for common data types
//!
//! Reusable serde helpers shared by the crate's configuration types.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Custom serialization module for Duration as whole seconds
///
/// Every duration RelayGuard exposes through configuration (circuit open
/// timeouts, rate-limit windows) is specified in seconds, so config files
/// stay plain integers.
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use relayguard_core::duration_secs;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_secs")]
///     window: Duration,
/// }
/// ```
pub mod duration_secs {
    use super::*;

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as whole seconds (u64), truncating sub-second
    /// precision
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize whole seconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
