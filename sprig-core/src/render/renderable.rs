//! The renderable sum type.
//!
//! Components return a [`Renderable`]. Both renderers walk the same value,
//! which is what keeps their output shapes identical.

use std::fmt;
use std::sync::Arc;

use super::dynamic::{same_arc, Dynamic};
use crate::dom::Node;
use crate::reactive::{Signal, Subscription};
use crate::tags::Tag;

/// Anything a renderer knows how to turn into output.
#[derive(Clone, Default)]
pub enum Renderable {
    /// Renders nothing (`None`, `false`, `()`).
    #[default]
    Empty,
    /// Escaped text.
    Text(String),
    /// Unescaped markup.
    Raw(Raw),
    /// A comment node.
    Comment(String),
    Tag(Tag),
    /// A signal whose current value is rendered and kept up to date.
    Signal(Arc<dyn SignalSource>),
    /// A loop or conditional.
    Dynamic(Dynamic),
    /// An existing client node, passed through as is.
    Node(Node),
    /// A sequence, flattened by the renderer.
    List(Vec<Renderable>),
}

impl Renderable {
    pub fn is_empty(&self) -> bool {
        match self {
            Renderable::Empty => true,
            Renderable::List(items) => items.iter().all(Renderable::is_empty),
            _ => false,
        }
    }
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderable::Empty => write!(f, "Empty"),
            Renderable::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Renderable::Raw(raw) => f.debug_tuple("Raw").field(&raw.0).finish(),
            Renderable::Comment(data) => f.debug_tuple("Comment").field(data).finish(),
            Renderable::Tag(tag) => f.debug_tuple("Tag").field(&tag.name()).finish(),
            Renderable::Signal(_) => write!(f, "Signal(..)"),
            Renderable::Dynamic(dynamic) => f.debug_tuple("Dynamic").field(dynamic).finish(),
            Renderable::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Renderable::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

/// Equality used to suppress notifications of signals holding renderables.
///
/// Text-like variants compare by content; signals, dynamics and nodes by
/// identity. Tags are freshly built descriptions and never compare equal,
/// so a derived signal returning a tag re-renders on every recomputation.
impl PartialEq for Renderable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Renderable::Empty, Renderable::Empty) => true,
            (Renderable::Text(a), Renderable::Text(b)) => a == b,
            (Renderable::Raw(a), Renderable::Raw(b)) => a == b,
            (Renderable::Comment(a), Renderable::Comment(b)) => a == b,
            (Renderable::Signal(a), Renderable::Signal(b)) => same_arc(a, b),
            (Renderable::Dynamic(a), Renderable::Dynamic(b)) => a.same_source(b),
            (Renderable::Node(a), Renderable::Node(b)) => a == b,
            (Renderable::List(a), Renderable::List(b)) => a == b,
            _ => false,
        }
    }
}

/// Markup inserted without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(pub String);

/// Wrap trusted markup so it is emitted verbatim.
pub fn raw(html: impl Into<String>) -> Renderable {
    Renderable::Raw(Raw(html.into()))
}

/// A type-erased signal that can be rendered.
pub trait SignalSource: Send + Sync {
    /// The current value as a renderable.
    fn current(&self) -> Renderable;

    /// Register a deferred listener receiving each new value.
    fn subscribe_render(&self, callback: Box<dyn Fn(Renderable) + Send + Sync>) -> Subscription;
}

impl<T> SignalSource for Signal<T>
where
    T: Clone + Send + Sync + Into<Renderable> + 'static,
{
    fn current(&self) -> Renderable {
        self.get().into()
    }

    fn subscribe_render(&self, callback: Box<dyn Fn(Renderable) + Send + Sync>) -> Subscription {
        self.subscribe(move |value: &T| callback(value.clone().into()))
    }
}

impl From<&str> for Renderable {
    fn from(text: &str) -> Self {
        Renderable::Text(text.to_string())
    }
}

impl From<String> for Renderable {
    fn from(text: String) -> Self {
        Renderable::Text(text)
    }
}

impl From<&String> for Renderable {
    fn from(text: &String) -> Self {
        Renderable::Text(text.clone())
    }
}

impl From<char> for Renderable {
    fn from(c: char) -> Self {
        Renderable::Text(c.to_string())
    }
}

/// `false` renders nothing, so `cond.then(..)`-style children work.
impl From<bool> for Renderable {
    fn from(value: bool) -> Self {
        if value {
            Renderable::Text("true".to_string())
        } else {
            Renderable::Empty
        }
    }
}

impl From<()> for Renderable {
    fn from(_: ()) -> Self {
        Renderable::Empty
    }
}

macro_rules! impl_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Renderable {
                fn from(value: $ty) -> Self {
                    Renderable::Text(value.to_string())
                }
            }
        )*
    };
}

impl_from_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl From<Raw> for Renderable {
    fn from(raw: Raw) -> Self {
        Renderable::Raw(raw)
    }
}

impl From<Tag> for Renderable {
    fn from(tag: Tag) -> Self {
        Renderable::Tag(tag)
    }
}

impl From<Node> for Renderable {
    fn from(node: Node) -> Self {
        Renderable::Node(node)
    }
}

impl From<Dynamic> for Renderable {
    fn from(dynamic: Dynamic) -> Self {
        Renderable::Dynamic(dynamic)
    }
}

impl<T> From<Signal<T>> for Renderable
where
    T: Clone + Send + Sync + Into<Renderable> + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Renderable::Signal(Arc::new(signal))
    }
}

impl<T> From<Option<T>> for Renderable
where
    T: Into<Renderable>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Renderable::Empty, Into::into)
    }
}

impl<T> From<Vec<T>> for Renderable
where
    T: Into<Renderable>,
{
    fn from(items: Vec<T>) -> Self {
        Renderable::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T> FromIterator<T> for Renderable
where
    T: Into<Renderable>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Renderable::List(iter.into_iter().map(Into::into).collect())
    }
}
