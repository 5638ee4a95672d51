//! Event and handler traits for typed in-process dispatch
//!
//! Runtime type identity is the routing key: an event's concrete type
//! decides which handlers see it. Handlers implement the typed
//! [`EventHandler`] trait; the erased [`DynEventHandler`] plus the
//! [`TypedEventHandler`] adapter bridge to the type-erased world of the bus
//! and resolver, so dispatch is a direct virtual call followed by a
//! downcast — no reflection.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BoxedError;

//==============================================================================
// Event Types
//==============================================================================

/// Identity every published event carries
///
/// A fresh id and timestamp are minted per event instance, giving consumers
/// a stable handle for dedup and audit without the dispatcher defining any
/// wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique id of this event instance
    pub id: Uuid,
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// Mint metadata for a new event occurring now
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), occurred_at: Utc::now() }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed in-process event
///
/// Implementors are plain structs carrying an [`EventMetadata`] plus their
/// domain payload. `as_any` exposes the concrete type for the downcast the
/// typed dispatch adapter performs.
///
/// # Examples
///
/// ```rust
/// use std::any::Any;
///
/// use relayguard_core::messaging::{Event, EventMetadata};
///
/// #[derive(Debug)]
/// struct OrderShipped {
///     metadata: EventMetadata,
///     order_id: u64,
/// }
///
/// impl Event for OrderShipped {
///     fn metadata(&self) -> &EventMetadata {
///         &self.metadata
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Event: Send + Sync + 'static {
    /// The event's identity metadata
    fn metadata(&self) -> &EventMetadata;

    /// The event as [`Any`], for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
}

//==============================================================================
// Handler Traits
//==============================================================================

/// Typed handler for one event type
///
/// One handler type handles one event type; a consumer interested in two
/// event types implements the trait on two types (newtype wrappers around a
/// shared core work well). Handlers must be safe to invoke concurrently.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    /// Handle one event; a returned error aborts the remaining handlers of
    /// that publish call
    async fn handle(&self, event: &E) -> Result<(), BoxedError>;
}

/// Type-erased handler the bus and resolver traffic in
///
/// Produced by wrapping a typed handler in [`TypedEventHandler`]; code
/// outside this module rarely implements it directly.
#[async_trait]
pub trait DynEventHandler: Send + Sync {
    /// Handle a type-erased event
    async fn handle_dyn(&self, event: &dyn Event) -> Result<(), BoxedError>;
}

/// Adapter erasing a typed [`EventHandler`] into a [`DynEventHandler`]
///
/// Dispatch downcasts the erased event back to `E`; receiving an event of
/// any other type is a wiring bug (a handler registered under the wrong
/// event type) and surfaces as an error rather than being silently dropped.
pub struct TypedEventHandler<E, H> {
    inner: H,
    _event: PhantomData<fn(E)>,
}

impl<E: Event, H: EventHandler<E>> TypedEventHandler<E, H> {
    /// Wrap a typed handler
    pub fn new(inner: H) -> Self {
        Self { inner, _event: PhantomData }
    }
}

impl<E, H: fmt::Debug> fmt::Debug for TypedEventHandler<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedEventHandler").field("inner", &self.inner).finish()
    }
}

#[async_trait]
impl<E: Event, H: EventHandler<E>> DynEventHandler for TypedEventHandler<E, H> {
    async fn handle_dyn(&self, event: &dyn Event) -> Result<(), BoxedError> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed) => self.inner.handle(typed).await,
            None => Err(format!(
                "handler for '{}' received an event of a different type",
                type_name::<E>()
            )
            .into()),
        }
    }
}
