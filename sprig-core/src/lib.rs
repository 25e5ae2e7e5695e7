//! Sprig Core
//!
//! This crate provides the core runtime for the Sprig UI framework.
//! It implements:
//!
//! - Reactive primitives (signals with direct and deferred listeners)
//! - A tag model and element factories for describing views
//! - Server rendering to HTML strings
//! - Client rendering to a live node tree with keyed loops and conditionals
//! - Hydration of server-rendered islands
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, the scheduler and render scopes
//! - `tags`: element descriptions and their attributes
//! - `render`: the renderable model and the server and client backends
//! - `dom`: the node tree the client renders into, plus an HTML parser
//! - `hydrate`: island scanning, component loading and children relocation
//! - `resource`: reference-counted resources shared between components
//!
//! # Example
//!
//! ```rust,ignore
//! use sprig_core::reactive::create_signal;
//! use sprig_core::render::render_to_string;
//! use sprig_core::tags::{button, div};
//!
//! let (count, set_count) = create_signal(0);
//! let html = render_to_string(|| {
//!     div()
//!         .child(count.clone())
//!         .child(button().on("click", move |_| set_count.update(|n| n + 1)).child("+"))
//! });
//! // <div><!---->0<!----><button>+</button></div>
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod hydrate;
pub mod reactive;
pub mod render;
pub mod resource;
pub mod tags;

pub use config::{HydrationConfig, SchedulerConfig, SprigConfig};
pub use error::{ConfigError, HydrationError, ParseError, RenderError};
pub use reactive::{create_signal, RenderScope, Scheduler, SetSignal, Signal};
pub use render::{render_to_string, ClientRenderer, Renderable, ServerRenderer};
pub use resource::{Lease, SharedPool};
