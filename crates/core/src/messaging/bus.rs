//! Typed in-process publish/subscribe event bus
//!
//! Producers publish typed events without knowing their consumers; consumers
//! subscribe handler types per event type and receive instances via the
//! bus's [`HandlerResolver`]. Dispatch is local-process only and sequential:
//! handlers run one at a time in subscription order, and the first failure
//! aborts the rest of that publish call.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::event::Event;
use super::resolver::HandlerResolver;
use crate::error::{BoxedError, ErrorClassification, ErrorSeverity};

//==============================================================================
// Error Types
//==============================================================================

/// Errors surfaced by event bus operations
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The same (event type, handler type) pair was subscribed twice
    #[error("Handler '{handler_type}' is already subscribed to event '{event_type}'")]
    DuplicateHandler { event_type: &'static str, handler_type: &'static str },

    /// A handler failed during dispatch; later handlers were not invoked
    #[error("Handler '{handler_type}' failed while handling event '{event_type}'")]
    HandlerFailed {
        event_type: &'static str,
        handler_type: &'static str,
        #[source]
        source: BoxedError,
    },
}

impl ErrorClassification for EventBusError {
    /// A duplicate subscription is a caller bug; retrying never helps. A
    /// failed handler's retryability is opaque here.
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

//==============================================================================
// Subscription Registry
//==============================================================================

/// An event type the bus has seen a subscription for
///
/// Introspection only; dispatch correctness never consults this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeInfo {
    /// Runtime type id of the event type
    pub type_id: TypeId,
    /// The event type's name, for diagnostics
    pub name: &'static str,
}

/// One subscribed handler type for an event type
#[derive(Debug, Clone, Copy)]
struct Subscription {
    handler_id: TypeId,
    handler_name: &'static str,
}

/// Registry state guarded by the bus's read-write lock
#[derive(Debug, Default)]
struct Registry {
    subscriptions: HashMap<TypeId, Vec<Subscription>>,
    known_events: Vec<EventTypeInfo>,
}

//==============================================================================
// Event Bus
//==============================================================================

/// In-process typed publish/subscribe dispatcher
///
/// Subscriptions map an event type to an ordered list of handler *types*;
/// instances come from the injected [`HandlerResolver`] at publish time, one
/// resolution per (event, handler type) pair. Subscribing and unsubscribing
/// take a brief write lock; `publish` snapshots the handler list under a
/// read lock and invokes handlers with no lock held, so registry churn never
/// blocks behind a slow handler. Clones share the registry and resolver.
///
/// # Examples
///
/// ```rust
/// use std::any::Any;
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use relayguard_core::error::BoxedError;
/// use relayguard_core::messaging::{
///     Event, EventBus, EventHandler, EventMetadata, HandlerRegistry,
/// };
///
/// #[derive(Debug)]
/// struct OrderShipped {
///     metadata: EventMetadata,
/// }
///
/// impl Event for OrderShipped {
///     fn metadata(&self) -> &EventMetadata {
///         &self.metadata
///     }
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// struct NotifyCustomer;
///
/// #[async_trait]
/// impl EventHandler<OrderShipped> for NotifyCustomer {
///     async fn handle(&self, _event: &OrderShipped) -> Result<(), BoxedError> {
///         Ok(())
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = HandlerRegistry::new();
/// registry.register::<OrderShipped, _>(NotifyCustomer);
///
/// let bus = EventBus::new(Arc::new(registry));
/// bus.subscribe::<OrderShipped, NotifyCustomer>()?;
///
/// bus.publish(&OrderShipped { metadata: EventMetadata::new() }).await?;
/// # Ok(())
/// # }
/// ```
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
    resolver: Arc<dyn HandlerResolver>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("EventBus")
            .field("event_types", &registry.known_events.len())
            .finish_non_exhaustive()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry), resolver: Arc::clone(&self.resolver) }
    }
}

impl EventBus {
    /// Create a bus dispatching through the given resolver
    pub fn new(resolver: Arc<dyn HandlerResolver>) -> Self {
        Self { registry: Arc::new(RwLock::new(Registry::default())), resolver }
    }

    /// Subscribe handler type `H` to event type `E`
    ///
    /// Handlers are invoked in subscription order. Subscribing the same
    /// (event, handler) pair twice fails with
    /// [`EventBusError::DuplicateHandler`]. The first subscription for a
    /// previously unseen event type also records it in the known-types
    /// registry.
    pub fn subscribe<E, H>(&self) -> Result<(), EventBusError>
    where
        E: Event,
        H: crate::messaging::EventHandler<E> + 'static,
    {
        let event_id = TypeId::of::<E>();
        let handler_id = TypeId::of::<H>();
        let mut registry = self.registry.write();

        let subscriptions = registry.subscriptions.entry(event_id).or_default();
        if subscriptions.iter().any(|s| s.handler_id == handler_id) {
            return Err(EventBusError::DuplicateHandler {
                event_type: type_name::<E>(),
                handler_type: type_name::<H>(),
            });
        }
        subscriptions.push(Subscription { handler_id, handler_name: type_name::<H>() });

        if !registry.known_events.iter().any(|e| e.type_id == event_id) {
            registry.known_events.push(EventTypeInfo { type_id: event_id, name: type_name::<E>() });
        }

        debug!(
            event_type = type_name::<E>(),
            handler_type = type_name::<H>(),
            "Handler subscribed"
        );
        Ok(())
    }

    /// Unsubscribe handler type `H` from event type `E`
    ///
    /// Removes the first matching subscription; a pair that was never
    /// subscribed is a silent no-op. The event type stays in the known-types
    /// registry.
    pub fn unsubscribe<E, H>(&self)
    where
        E: Event,
        H: crate::messaging::EventHandler<E> + 'static,
    {
        let handler_id = TypeId::of::<H>();
        let mut registry = self.registry.write();

        if let Some(subscriptions) = registry.subscriptions.get_mut(&TypeId::of::<E>()) {
            if let Some(position) = subscriptions.iter().position(|s| s.handler_id == handler_id) {
                subscriptions.remove(position);
                debug!(
                    event_type = type_name::<E>(),
                    handler_type = type_name::<H>(),
                    "Handler unsubscribed"
                );
            }
        }
    }

    /// Publish an event to its subscribed handlers
    ///
    /// Snapshots the subscription list, then sequentially resolves and
    /// invokes each handler, awaiting one before the next. A handler type
    /// the resolver cannot produce is skipped. A handler failure propagates
    /// as [`EventBusError::HandlerFailed`] and aborts the remaining handlers
    /// of this call. No subscribers is a successful no-op.
    #[instrument(skip(self, event), fields(event_type = type_name::<E>()))]
    pub async fn publish<E: Event>(&self, event: &E) -> Result<(), EventBusError> {
        let snapshot: Vec<Subscription> = {
            let registry = self.registry.read();
            registry.subscriptions.get(&TypeId::of::<E>()).cloned().unwrap_or_default()
        };

        if snapshot.is_empty() {
            debug!(event_id = %event.metadata().id, "No handlers subscribed, skipping dispatch");
            return Ok(());
        }

        for subscription in snapshot {
            let Some(handler) = self.resolver.resolve(subscription.handler_id) else {
                debug!(
                    handler_type = subscription.handler_name,
                    "Subscribed handler did not resolve, skipping"
                );
                continue;
            };

            if let Err(source) = handler.handle_dyn(event).await {
                warn!(
                    handler_type = subscription.handler_name,
                    event_id = %event.metadata().id,
                    "Handler failed, aborting remaining dispatch"
                );
                return Err(EventBusError::HandlerFailed {
                    event_type: type_name::<E>(),
                    handler_type: subscription.handler_name,
                    source,
                });
            }
        }

        Ok(())
    }

    /// Event types that have ever had a subscription, in first-seen order
    pub fn known_event_types(&self) -> Vec<EventTypeInfo> {
        self.registry.read().known_events.clone()
    }

    /// Number of handler types currently subscribed to event type `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.registry
            .read()
            .subscriptions
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}
