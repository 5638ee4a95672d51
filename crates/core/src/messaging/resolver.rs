//! Handler resolution for the event bus
//!
//! The bus records *handler types*, not instances; at publish time it asks a
//! [`HandlerResolver`] to turn each subscribed type into an invocable
//! instance. Hosts with a service container implement the trait over it;
//! [`HandlerRegistry`] is the standalone reference implementation for hosts
//! (and tests) without one.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::event::{DynEventHandler, Event, EventHandler, TypedEventHandler};

/// Capability the bus uses to turn a subscribed handler type into an
/// instance
///
/// `resolve` is called once per (event, handler-type) pair per publish;
/// returning `None` makes the bus skip that handler for that event. A
/// container-backed implementation can scope instances per resolution;
/// nothing requires the same instance twice.
pub trait HandlerResolver: Send + Sync {
    /// Produce an invocable instance for a handler type, or `None` if the
    /// type cannot be resolved
    fn resolve(&self, handler_id: TypeId) -> Option<Arc<dyn DynEventHandler>>;
}

/// Reference [`HandlerResolver`] holding one instance per handler type
///
/// Registration wraps the typed handler in its erasing adapter, so `resolve`
/// is a plain map lookup. Clones share the underlying registrations.
///
/// # Examples
///
/// ```rust
/// use std::any::Any;
///
/// use async_trait::async_trait;
/// use relayguard_core::error::BoxedError;
/// use relayguard_core::messaging::{
///     Event, EventHandler, EventMetadata, HandlerRegistry,
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
/// let registry = HandlerRegistry::new();
/// registry.register::<OrderShipped, _>(NotifyCustomer);
/// assert!(registry.contains::<NotifyCustomer>());
/// ```
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<TypeId, Arc<dyn DynEventHandler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry").field("registered", &self.handlers.len()).finish()
    }
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { handlers: Arc::new(DashMap::new()) }
    }

    /// Register an instance of handler type `H` for event type `E`
    ///
    /// Replaces any previous instance registered under `H`.
    pub fn register<E: Event, H: EventHandler<E> + 'static>(&self, handler: H) {
        self.handlers
            .insert(TypeId::of::<H>(), Arc::new(TypedEventHandler::<E, H>::new(handler)));
    }

    /// Remove the instance registered under handler type `H`, if any
    pub fn deregister<H: 'static>(&self) {
        self.handlers.remove(&TypeId::of::<H>());
    }

    /// Check whether an instance is registered under handler type `H`
    pub fn contains<H: 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<H>())
    }

    /// Number of registered handler instances
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check whether the registry holds no instances
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve(&self, handler_id: TypeId) -> Option<Arc<dyn DynEventHandler>> {
        self.handlers.get(&handler_id).map(|entry| Arc::clone(entry.value()))
    }
}
