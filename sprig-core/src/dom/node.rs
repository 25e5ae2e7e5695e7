//! Node tree
//!
//! A small DOM: elements, text, comments, fragments and shadow roots with
//! reference identity and parent/sibling navigation. The client renderer
//! builds these nodes; hydration walks and rewires them.
//!
//! # Identity
//!
//! A [`Node`] is a shared handle. Two handles are equal exactly when they
//! refer to the same node, which is what identity-based patching relies on.
//!
//! # Locking
//!
//! Each node guards its own state. Tree operations never hold two node locks
//! at once: they detach, then attach, one node at a time.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::serialize;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of node this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a lower-cased tag name.
    Element(String),
    Text,
    Comment,
    /// A document fragment (the content of a `<template>`).
    Fragment,
    /// A shadow root with its mode (`open` or `closed`).
    ShadowRoot(String),
}

/// An event delivered to a handler.
#[derive(Debug, Clone)]
pub struct Event {
    /// Lower-cased event name without the `on` prefix (`click`).
    pub name: String,
    /// The node the event was dispatched on.
    pub target: Node,
}

/// A DOM event handler.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct NodeState {
    parent: Weak<NodeInner>,
    children: Vec<Node>,
    data: String,
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    handlers: HashMap<String, EventHandler>,
    template_content: Option<Node>,
    shadow_root: Option<Node>,
}

struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    state: Mutex<NodeState>,
}

/// A shared handle to a node.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    fn with_kind(kind: NodeKind, data: String) -> Self {
        Node(Arc::new(NodeInner {
            id: NodeId::new(),
            kind,
            state: Mutex::new(NodeState {
                data,
                ..NodeState::default()
            }),
        }))
    }

    /// Create an element. `<template>` elements get a content fragment.
    pub fn element(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let is_template = name == "template";
        let node = Self::with_kind(NodeKind::Element(name), String::new());
        if is_template {
            node.0.state.lock().template_content = Some(Node::fragment());
        }
        node
    }

    /// Create a text node.
    pub fn text(data: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, data.into())
    }

    /// Create a comment node.
    pub fn comment(data: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Comment, data.into())
    }

    /// Create an empty document fragment.
    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment, String::new())
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// The element's tag name, for elements.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, NodeKind::Text)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.0.kind, NodeKind::Comment)
    }

    /// Whether this is a comment whose text is exactly `data`.
    pub fn is_comment_with(&self, data: &str) -> bool {
        self.is_comment() && self.0.state.lock().data == data
    }

    /// Character data of a text or comment node.
    pub fn data(&self) -> String {
        self.0.state.lock().data.clone()
    }

    pub fn set_data(&self, data: impl Into<String>) {
        self.0.state.lock().data = data.into();
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.state.lock().parent.upgrade().map(Node)
    }

    /// A snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.state.lock().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.state.lock().children.len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.state.lock().children.first().cloned()
    }

    /// Position of this node among its parent's children.
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let siblings = parent.0.state.lock();
        let index = siblings.children.iter().position(|child| child == self);
        index
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let siblings = parent.0.state.lock();
        let index = siblings.children.iter().position(|child| child == self)?;
        let next = siblings.children.get(index + 1).cloned();
        next
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let siblings = parent.0.state.lock();
        let index = siblings.children.iter().position(|child| child == self)?;
        let previous = index.checked_sub(1).and_then(|i| siblings.children.get(i).cloned());
        previous
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if &node == self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Every descendant in document order (not crossing into template
    /// content or shadow roots) matching `predicate`.
    pub fn find_all(&self, predicate: &dyn Fn(&Node) -> bool) -> Vec<Node> {
        let mut found = Vec::new();
        let mut stack: Vec<Node> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if predicate(&node) {
                found.push(node.clone());
            }
            stack.extend(node.children().into_iter().rev());
        }
        found
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child. The child is detached from its old parent first.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child == self || reference == Some(child) {
            return;
        }
        child.remove();
        {
            let mut state = self.0.state.lock();
            let index = reference
                .and_then(|r| state.children.iter().position(|c| c == r))
                .unwrap_or(state.children.len());
            state.children.insert(index, child.clone());
        }
        child.0.state.lock().parent = Arc::downgrade(&self.0);
    }

    /// Detach this node from its parent.
    pub fn remove(&self) {
        let parent = {
            let mut state = self.0.state.lock();
            let parent = state.parent.upgrade();
            state.parent = Weak::new();
            parent
        };
        if let Some(parent) = parent {
            parent
                .state
                .lock()
                .children
                .retain(|child| !Arc::ptr_eq(&child.0, &self.0));
        }
    }

    /// Put `replacement` where this node is. Does nothing when detached.
    pub fn replace_with(&self, replacement: &Node) {
        if replacement == self {
            return;
        }
        if let Some(parent) = self.parent() {
            parent.insert_before(replacement, Some(self));
            self.remove();
        }
    }

    /// Detach all children.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.remove();
        }
    }

    // ------------------------------------------------------------------
    // Attributes, style and handlers
    // ------------------------------------------------------------------

    /// Set an attribute. Setting `style` also replaces the style properties.
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut state = self.0.state.lock();
        if name == "style" {
            state.style = serialize::parse_style(&value);
        }
        state.attributes.insert(name.to_string(), value);
    }

    pub fn remove_attribute(&self, name: &str) {
        let mut state = self.0.state.lock();
        if name == "style" {
            state.style.clear();
        }
        state.attributes.shift_remove(name);
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.state.lock().attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.state.lock().attributes.contains_key(name)
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .state
            .lock()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set one style property and refresh the `style` attribute.
    pub fn set_style_property(&self, name: &str, value: impl Into<String>) {
        let mut state = self.0.state.lock();
        state.style.insert(name.to_string(), value.into());
        let text = serialize::style_text(&state.style);
        state.attributes.insert("style".to_string(), text);
    }

    pub fn remove_style_property(&self, name: &str) {
        let mut state = self.0.state.lock();
        state.style.shift_remove(name);
        let text = serialize::style_text(&state.style);
        state.attributes.insert("style".to_string(), text);
    }

    pub fn style_property(&self, name: &str) -> Option<String> {
        self.0.state.lock().style.get(name).cloned()
    }

    /// Install (or with `None`, remove) the handler for `event`.
    pub fn set_handler(&self, event: &str, handler: Option<EventHandler>) {
        let event = event.to_ascii_lowercase();
        let mut state = self.0.state.lock();
        match handler {
            Some(handler) => {
                state.handlers.insert(event, handler);
            }
            None => {
                state.handlers.remove(&event);
            }
        }
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.0
            .state
            .lock()
            .handlers
            .contains_key(&event.to_ascii_lowercase())
    }

    /// Invoke this node's handler for `event`. Returns whether one ran.
    pub fn dispatch(&self, event: &str) -> bool {
        let event = event.to_ascii_lowercase();
        let handler = self.0.state.lock().handlers.get(&event).cloned();
        match handler {
            Some(handler) => {
                handler(&Event {
                    name: event,
                    target: self.clone(),
                });
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Templates and shadow roots
    // ------------------------------------------------------------------

    /// The content fragment of a `<template>` element.
    pub fn template_content(&self) -> Option<Node> {
        self.0.state.lock().template_content.clone()
    }

    /// Attach (or return the existing) shadow root.
    pub fn attach_shadow(&self, mode: &str) -> Node {
        let mut state = self.0.state.lock();
        state
            .shadow_root
            .get_or_insert_with(|| {
                Node::with_kind(NodeKind::ShadowRoot(mode.to_string()), String::new())
            })
            .clone()
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.0.state.lock().shadow_root.clone()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text | NodeKind::Comment => self.data(),
            _ => self
                .children()
                .iter()
                .filter(|child| !child.is_comment())
                .map(Node::text_content)
                .collect(),
        }
    }

    /// Serialize this node and its subtree.
    pub fn outer_html(&self) -> String {
        serialize::outer_html(self)
    }

    /// Serialize this node's children.
    pub fn inner_html(&self) -> String {
        serialize::inner_html(self)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element(name) => write!(f, "<{name}#{}>", self.0.id.raw()),
            NodeKind::Text => write!(f, "#text({:?})", self.data()),
            NodeKind::Comment => write!(f, "<!--{}-->", self.data()),
            NodeKind::Fragment => write!(f, "#fragment"),
            NodeKind::ShadowRoot(mode) => write!(f, "#shadow-root({mode})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn list(parent: &Node) -> Vec<String> {
        parent
            .children()
            .iter()
            .map(|n| n.tag_name().map(str::to_string).unwrap_or_else(|| n.data()))
            .collect()
    }

    #[test]
    fn identity_equality() {
        let a = Node::text("x");
        let b = Node::text("x");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn insert_before_and_navigation() {
        let parent = Node::element("ul");
        let a = Node::element("a");
        let c = Node::element("c");
        parent.append_child(&a);
        parent.append_child(&c);
        let b = Node::element("b");
        parent.insert_before(&b, Some(&c));

        assert_eq!(list(&parent), vec!["a", "b", "c"]);
        assert_eq!(b.previous_sibling(), Some(a.clone()));
        assert_eq!(b.next_sibling(), Some(c.clone()));
        assert_eq!(c.index_in_parent(), Some(2));
        assert_eq!(b.parent(), Some(parent.clone()));
    }

    #[test]
    fn inserting_moves_from_old_parent() {
        let first = Node::element("div");
        let second = Node::element("div");
        let child = Node::text("moving");
        first.append_child(&child);
        second.append_child(&child);

        assert_eq!(first.child_count(), 0);
        assert_eq!(second.children(), vec![child.clone()]);
        assert_eq!(child.parent(), Some(second));
    }

    #[test]
    fn replace_with_keeps_position() {
        let parent = Node::element("p");
        let a = Node::text("a");
        let b = Node::text("b");
        let c = Node::text("c");
        for n in [&a, &b, &c] {
            parent.append_child(n);
        }
        let replacement = Node::comment("x");
        b.replace_with(&replacement);

        assert_eq!(list(&parent), vec!["a", "x", "c"]);
        assert!(b.parent().is_none());
    }

    #[test]
    fn style_properties_update_style_attribute() {
        let el = Node::element("div");
        el.set_attribute("id", "main");
        el.set_style_property("color", "red");
        el.set_style_property("--gap", "4px");

        assert_eq!(el.attribute("style").as_deref(), Some("color: red; --gap: 4px;"));
        el.set_attribute("style", "margin: 0;");
        assert_eq!(el.style_property("margin").as_deref(), Some("0"));
        assert_eq!(el.style_property("color"), None);
    }

    #[test]
    fn dispatch_invokes_lowercased_handler() {
        let el = Node::element("button");
        let clicks = Arc::new(AtomicUsize::new(0));
        let inner = clicks.clone();
        el.set_handler(
            "Click",
            Some(Arc::new(move |event: &Event| {
                assert_eq!(event.name, "click");
                inner.fetch_add(1, Ordering::SeqCst);
            })),
        );

        assert!(el.dispatch("click"));
        assert!(!el.dispatch("input"));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn template_has_content_fragment() {
        let template = Node::element("template");
        let content = template.template_content().unwrap();
        assert_eq!(content.kind(), &NodeKind::Fragment);
        assert!(Node::element("div").template_content().is_none());
    }

    #[test]
    fn find_all_in_document_order() {
        let root = Node::element("main");
        let a = Node::element("section");
        let b = Node::element("section");
        let nested = Node::element("section");
        root.append_child(&a);
        a.append_child(&nested);
        root.append_child(&b);

        let found = root.find_all(&|n| n.tag_name() == Some("section"));
        assert_eq!(found, vec![a, nested, b]);
    }
}
