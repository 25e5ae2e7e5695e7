//! Reactive Primitives
//!
//! This module implements the reactive core: signals, their subscriptions,
//! the scheduler that runs deferred work, and the render scopes that own
//! cleanup.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for a value with two tiers of listeners.
//! Direct listeners run synchronously inside the write; deferred listeners
//! are queued on the [`Scheduler`]. Derived signals ([`Signal::derive`])
//! ride on direct listeners, so a chain of derivations is consistent as soon
//! as the root write returns, while everything that touches the DOM waits for
//! the scheduler.
//!
//! ## Scheduler
//!
//! The [`Scheduler`] holds the task queue (deferred listeners) and the frame
//! queue (DOM writes). Hosts drain it from their event loop.
//!
//! ## Render Scopes
//!
//! A [`RenderScope`] is a capture frame for destroy callbacks and context
//! values. Renderers create one per independently destroyable region.

mod scheduler;
mod scope;
mod signal;
mod subscription;

pub use scheduler::{Scheduler, Task};
pub use scope::{
    consume, provide_context, try_use_on_destroy, use_on_destroy, RenderScope, ScopeGuard, ScopeId,
};
pub use signal::{
    create_lazy_signal, create_signal, create_signal_in, create_signal_with, SetSignal, Signal,
};
pub use subscription::{Subscription, SubscriptionId};
