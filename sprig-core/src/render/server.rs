//! Server Renderer
//!
//! Renders a tree to HTML. Output is a one-shot snapshot: signals contribute
//! their current value and no subscription outlives the render.
//!
//! Every signal and dynamic region is bracketed by two empty comments
//! (`<!---->`). Those sentinels are the only thing hydration uses to find
//! where a region's nodes start and end.

use super::core::{render, render_value, with_scope, Renderer};
use super::dynamic::Dynamic;
use super::renderable::{Raw, Renderable, SignalSource};
use tracing::warn;

use crate::dom::{is_void, parse_fragment, Node};
use crate::reactive::RenderScope;
use crate::tags::{css_property_name, AttrValue, StyleValue, Tag};

/// The sentinel bracketing a dynamic region.
pub const SENTINEL: &str = "<!---->";

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders to HTML strings, one per top-level node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerRenderer;

impl ServerRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Serialize a tag's attributes.
    ///
    /// Event handlers, refs and any attribute named `on*` are dropped, as are
    /// `false` booleans. A `true` boolean is written as `name=""`, the form
    /// the client serializer produces for a bare attribute, so both sides
    /// emit identical markup.
    fn attributes(&self, tag: &Tag) -> String {
        let mut out = String::new();
        for (name, value) in tag.attributes() {
            if name.starts_with("on") {
                continue;
            }
            let text = match value {
                AttrValue::Text(text) => Some(text.clone()),
                AttrValue::Bool(present) => present.then(String::new),
                AttrValue::Bound(source) => source.current(),
                AttrValue::Style(props) => style_snapshot(props),
                AttrValue::Handler(_) | AttrValue::Ref(_) => None,
            };
            if let Some(text) = text {
                out.push_str(&format!(" {name}=\"{}\"", escape_html(&text)));
            }
        }
        out
    }
}

/// `k: v;` pairs of the current style values, or `None` when there are none.
fn style_snapshot(props: &[(String, StyleValue)]) -> Option<String> {
    let declarations: Vec<String> = props
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                StyleValue::Static(value) => Some(value.clone()),
                StyleValue::Bound(source) => source.current(),
            }?;
            Some(format!("{}: {value};", css_property_name(name)))
        })
        .collect();
    (!declarations.is_empty()).then(|| declarations.join(" "))
}

fn bracket(inner: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(inner.len() + 2);
    out.push(SENTINEL.to_string());
    out.extend(inner);
    out.push(SENTINEL.to_string());
    out
}

impl Renderer for ServerRenderer {
    type Output = String;

    fn render_text(&self, text: &str, _scope: &RenderScope) -> Vec<String> {
        vec![escape_html(text)]
    }

    /// One string per top-level node of the markup, as the client produces
    /// one node each.
    fn render_raw(&self, raw: &Raw, _scope: &RenderScope) -> Vec<String> {
        match parse_fragment(&raw.0) {
            Ok(nodes) => nodes.iter().map(Node::outer_html).collect(),
            Err(err) => {
                warn!(error = %err, "raw markup did not parse; emitting it as text");
                vec![escape_html(&raw.0)]
            }
        }
    }

    fn render_comment(&self, data: &str, _scope: &RenderScope) -> Vec<String> {
        vec![format!("<!--{data}-->")]
    }

    fn render_tag(&self, tag: &Tag, scope: &RenderScope) -> Vec<String> {
        let name = tag.name();
        let mut html = format!("<{name}{}>", self.attributes(tag));
        if is_void(name) {
            return vec![html];
        }
        let raw_text = matches!(name, "script" | "style");
        for child in tag.child_nodes() {
            match child {
                Renderable::Text(text) if raw_text => html.push_str(text),
                _ => {
                    for part in render_value(self, child, scope) {
                        html.push_str(&part);
                    }
                }
            }
        }
        html.push_str(&format!("</{name}>"));
        vec![html]
    }

    fn render_signal(&self, signal: &dyn SignalSource, scope: &RenderScope) -> Vec<String> {
        bracket(render_value(self, &signal.current(), scope))
    }

    fn render_dynamic(&self, dynamic: &Dynamic, scope: &RenderScope) -> Vec<String> {
        let inner = match dynamic {
            Dynamic::Loop(source) => source
                .entries()
                .iter()
                .flat_map(|entry| {
                    let item_scope = scope.child();
                    let (rendered, _setter) =
                        with_scope(&item_scope, || source.render_entry(entry));
                    let html = render_value(self, &rendered, &item_scope);
                    item_scope.destroy();
                    html
                })
                .collect(),
            Dynamic::Conditional(source) => {
                let branch_scope = scope.child();
                let rendered = with_scope(&branch_scope, || source.render());
                let html = render_value(self, &rendered, &branch_scope);
                branch_scope.destroy();
                html
            }
        };
        bracket(inner)
    }

    fn render_node(&self, node: &Node, _scope: &RenderScope) -> Vec<String> {
        vec![node.outer_html()]
    }
}

/// Render a component to one HTML string.
pub fn render_to_string<F, V>(component: F) -> String
where
    F: FnOnce() -> V,
    V: Into<Renderable>,
{
    render(&ServerRenderer, component).destroy().concat()
}
