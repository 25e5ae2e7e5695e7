//! Shared render walk.
//!
//! [`render_value`] is the one dispatch over [`Renderable`] that both
//! backends use. A backend only decides what a text node, a tag or a signal
//! region turns into; the walk itself (flattening, skipping empty values)
//! is common, so server and client always produce the same number of
//! top-level outputs for the same tree.

use tracing::debug;

use super::dynamic::Dynamic;
use super::renderable::{Raw, Renderable, SignalSource};
use crate::dom::Node;
use crate::reactive::RenderScope;
use crate::tags::Tag;

/// A render backend.
///
/// Each method returns the outputs for one renderable; the walk
/// concatenates them. `scope` is the capture frame subscriptions and
/// destroy callbacks are registered on.
pub trait Renderer {
    type Output;

    fn render_text(&self, text: &str, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_raw(&self, raw: &Raw, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_comment(&self, data: &str, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_tag(&self, tag: &Tag, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_signal(&self, signal: &dyn SignalSource, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_dynamic(&self, dynamic: &Dynamic, scope: &RenderScope) -> Vec<Self::Output>;

    fn render_node(&self, node: &Node, scope: &RenderScope) -> Vec<Self::Output>;
}

/// Walk `value` with `renderer`.
pub fn render_value<R>(renderer: &R, value: &Renderable, scope: &RenderScope) -> Vec<R::Output>
where
    R: Renderer + ?Sized,
{
    match value {
        Renderable::Empty => Vec::new(),
        Renderable::List(items) => items
            .iter()
            .flat_map(|item| render_value(renderer, item, scope))
            .collect(),
        Renderable::Text(text) if text.is_empty() => Vec::new(),
        Renderable::Text(text) => renderer.render_text(text, scope),
        Renderable::Raw(raw) => renderer.render_raw(raw, scope),
        Renderable::Comment(data) => renderer.render_comment(data, scope),
        Renderable::Tag(tag) => renderer.render_tag(tag, scope),
        Renderable::Signal(signal) => renderer.render_signal(signal.as_ref(), scope),
        Renderable::Dynamic(dynamic) => renderer.render_dynamic(dynamic, scope),
        Renderable::Node(node) => renderer.render_node(node, scope),
    }
}

/// The result of [`render`]: the outputs and the scope owning everything
/// the render registered.
#[derive(Debug)]
pub struct RenderOutput<O> {
    pub nodes: Vec<O>,
    pub scope: RenderScope,
}

impl<O> RenderOutput<O> {
    /// Tear down subscriptions and run destroy callbacks.
    pub fn destroy(self) -> Vec<O> {
        self.scope.destroy();
        self.nodes
    }
}

/// Render a component into a fresh root scope.
///
/// The component runs with the scope entered, so it can call
/// [`use_on_destroy`](crate::reactive::use_on_destroy) and
/// [`provide_context`](crate::reactive::provide_context).
pub fn render<R, F, V>(renderer: &R, component: F) -> RenderOutput<R::Output>
where
    R: Renderer + ?Sized,
    F: FnOnce() -> V,
    V: Into<Renderable>,
{
    render_in(renderer, RenderScope::new(), component)
}

/// Render a component into an existing scope.
pub fn render_in<R, F, V>(renderer: &R, scope: RenderScope, component: F) -> RenderOutput<R::Output>
where
    R: Renderer + ?Sized,
    F: FnOnce() -> V,
    V: Into<Renderable>,
{
    let nodes = {
        let _guard = scope.enter();
        let value = component().into();
        render_value(renderer, &value, &scope)
    };
    debug!(scope = ?scope.id(), outputs = nodes.len(), "rendered component");
    RenderOutput { nodes, scope }
}

/// Run a user callback with `scope` as the ambient capture frame.
pub(crate) fn with_scope<T>(scope: &RenderScope, f: impl FnOnce() -> T) -> T {
    let _guard = scope.enter();
    f()
}
