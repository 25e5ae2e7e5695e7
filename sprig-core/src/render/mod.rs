//! Rendering
//!
//! Components describe their output as a [`Renderable`]. Two backends walk
//! the same description:
//!
//! - [`ServerRenderer`] produces HTML strings, with every signal and dynamic
//!   region bracketed by `<!---->` sentinels.
//! - [`ClientRenderer`] produces live [`Node`](crate::dom::Node)s, brackets
//!   the same regions with comment markers and patches them when signals
//!   change.
//!
//! Because both go through [`render_value`], they agree on the number and
//! order of top-level nodes, which hydration depends on.

mod client;
mod core;
mod dynamic;
mod renderable;
mod server;

pub use self::client::ClientRenderer;
pub use self::core::{render, render_in, render_value, RenderOutput, Renderer};
pub use self::dynamic::{
    conditional, each, ConditionalSource, Dynamic, ItemSetter, LoopEntry, LoopKey, LoopSource,
};
pub use self::renderable::{raw, Raw, Renderable, SignalSource};
pub use self::server::{escape_html, render_to_string, ServerRenderer, SENTINEL};
