//! Typed in-process event dispatch
//!
//! This module decouples producers of domain events from their consumers
//! within one process, with no broker:
//! - **[`Event`]** / **[`EventMetadata`]**: typed events with identity
//! - **[`EventHandler`]**: the typed handler trait, erased through
//!   [`DynEventHandler`] and [`TypedEventHandler`] so dispatch is a virtual
//!   call plus a downcast
//! - **[`HandlerResolver`]**: the collaborator producing handler instances
//!   at publish time, with [`HandlerRegistry`] as reference implementation
//! - **[`EventBus`]**: the subscription registry and dispatcher
//!
//! Dispatch is sequential and fail-fast: handlers for one publish call run
//! in subscription order, and the first failure aborts the rest. Delivery is
//! best-effort in-process messaging, not durable queueing.

pub mod bus;
pub mod event;
pub mod resolver;

// Re-export bus types
pub use bus::{EventBus, EventBusError, EventTypeInfo};
// Re-export event and handler traits
pub use event::{DynEventHandler, Event, EventHandler, EventMetadata, TypedEventHandler};
// Re-export resolution types
pub use resolver::{HandlerRegistry, HandlerResolver};
