//! Client Renderer
//!
//! Renders a tree to live [`Node`]s and keeps them up to date.
//!
//! # Regions
//!
//! Every signal, loop and conditional renders between two empty comment
//! markers that stay in the tree for the region's whole life. Updates are
//! computed in the signal's deferred task and applied in an animation
//! frame: nodes that are not part of the new content are removed, and the
//! new content is threaded in after the start marker. Nodes are compared by
//! identity, so content that survives an update (loop items, unchanged
//! branches) is moved rather than recreated.
//!
//! # Scopes
//!
//! Each region owns a child [`RenderScope`] per rendered piece of content (one
//! per loop item, one per signal value). Replacing or removing content
//! destroys exactly that scope.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::core::{render, render_value, with_scope, RenderOutput, Renderer};
use super::dynamic::{ConditionalSource, Dynamic, ItemSetter, LoopEntry, LoopKey, LoopSource};
use super::renderable::{Raw, Renderable, SignalSource};
use crate::dom::{parse_fragment, Node};
use crate::error::RenderError;
use crate::reactive::{RenderScope, Scheduler};
use crate::tags::{css_property_name, AttrValue, StyleValue, Tag};

/// Renders to live nodes with subscriptions.
///
/// DOM writes caused by updates are queued as animation frames on the
/// renderer's scheduler.
#[derive(Debug, Clone)]
pub struct ClientRenderer {
    scheduler: Scheduler,
    /// Regions that were updated while their markers had no parent.
    detached: DetachedRegions,
}

type DetachedRegions = Arc<Mutex<Vec<Weak<Region>>>>;

impl Default for ClientRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRenderer {
    /// A renderer using the current thread's scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::current())
    }

    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            detached: Arc::default(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Append rendered top-level nodes to `parent`.
    ///
    /// Top-level regions updated before they were attached hold on to their
    /// latest content; it replaces the stale nodes here.
    pub fn mount(&self, nodes: &[Node], parent: &Node) {
        for node in nodes {
            parent.append_child(node);
        }
        let pending: Vec<Weak<Region>> = std::mem::take(&mut *self.detached.lock());
        let mut synced = 0;
        for region in pending.iter().filter_map(Weak::upgrade) {
            if region.start.parent().is_some() {
                region.sync();
                synced += 1;
            } else {
                self.detached.lock().push(Arc::downgrade(&region));
            }
        }
        debug!(synced, "mounted nodes");
    }

    /// Render a component that must produce exactly one node.
    pub fn render_single<F, V>(&self, component: F) -> Result<RenderOutput<Node>, RenderError>
    where
        F: FnOnce() -> V,
        V: Into<Renderable>,
    {
        let output = render(self, component);
        if output.nodes.len() != 1 {
            let found = output.nodes.len();
            output.destroy();
            return Err(RenderError::ExpectedSingleNode { found });
        }
        Ok(output)
    }

    fn apply_attributes(&self, element: &Node, tag: &Tag, scope: &RenderScope) {
        for (name, value) in tag.attributes() {
            match value {
                AttrValue::Text(text) => element.set_attribute(name, text.as_str()),
                AttrValue::Bool(true) => element.set_attribute(name, ""),
                AttrValue::Bool(false) => {}
                AttrValue::Bound(source) => {
                    if let Some(text) = source.current() {
                        element.set_attribute(name, text);
                    }
                    let scheduler = self.scheduler.clone();
                    let element = element.clone();
                    let name = name.clone();
                    scope.own(source.subscribe_attr(Box::new(move |value| {
                        let element = element.clone();
                        let name = name.clone();
                        scheduler.request_animation_frame(move || match value {
                            Some(text) => element.set_attribute(&name, text),
                            None => element.remove_attribute(&name),
                        });
                    })));
                }
                AttrValue::Style(props) => self.apply_style(element, props, scope),
                AttrValue::Handler(handler) => {
                    let event = name.strip_prefix("on").unwrap_or(name);
                    element.set_handler(event, Some(Arc::clone(handler)));
                }
                AttrValue::Ref(callback) => {
                    callback(Some(element));
                    let callback = Arc::clone(callback);
                    scope.on_destroy(move || callback(None));
                }
            }
        }
    }

    fn apply_style(&self, element: &Node, props: &[(String, StyleValue)], scope: &RenderScope) {
        for (name, value) in props {
            let property = css_property_name(name);
            match value {
                StyleValue::Static(text) => element.set_style_property(&property, text.as_str()),
                StyleValue::Bound(source) => {
                    if let Some(text) = source.current() {
                        element.set_style_property(&property, text);
                    }
                    let scheduler = self.scheduler.clone();
                    let element = element.clone();
                    scope.own(source.subscribe_attr(Box::new(move |value| {
                        let element = element.clone();
                        let property = property.clone();
                        scheduler.request_animation_frame(move || match value {
                            Some(text) => element.set_style_property(&property, text),
                            None => element.remove_style_property(&property),
                        });
                    })));
                }
            }
        }
    }

    /// Create the markers of a new region and the region's content scope.
    fn open_region(&self, scope: &RenderScope) -> Arc<Region> {
        let region = Arc::new(Region {
            start: Node::comment(""),
            end: Node::comment(""),
            parent: scope.child(),
            content: Mutex::new(None),
            tracked: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            detached: Arc::clone(&self.detached),
            scheduler: self.scheduler.clone(),
        });
        let owned = Arc::clone(&region);
        scope.on_destroy(move || {
            owned.destroyed.store(true, Ordering::SeqCst);
            owned.destroy_content();
        });
        region
    }

    fn render_loop(&self, source: &Arc<dyn LoopSource>, scope: &RenderScope) -> Vec<Node> {
        let region = self.open_region(scope);
        let state = Arc::new(Mutex::new(IndexMap::<LoopKey, LoopSlot>::new()));

        let mut nodes = vec![region.start.clone()];
        {
            let mut slots = state.lock();
            for entry in source.entries() {
                let slot = self.render_slot(source.as_ref(), &entry, &region.parent);
                nodes.extend(slot.nodes.iter().cloned());
                slots.insert(entry.key, slot);
            }
        }
        nodes.push(region.end.clone());
        *region.tracked.lock() = nodes[1..nodes.len() - 1].to_vec();

        let teardown = Arc::clone(&state);
        scope.on_destroy(move || {
            for (_, slot) in teardown.lock().drain(..) {
                slot.scope.destroy();
            }
        });

        let renderer = self.clone();
        let loop_source = Arc::clone(source);
        let subscription = source.subscribe_entries(Box::new(move |entries| {
            renderer.update_loop(loop_source.as_ref(), &region, &state, entries);
        }));
        scope.own(subscription);
        nodes
    }

    fn render_slot(
        &self,
        source: &dyn LoopSource,
        entry: &LoopEntry,
        parent: &RenderScope,
    ) -> LoopSlot {
        let scope = parent.child();
        let (rendered, setter) = with_scope(&scope, || source.render_entry(entry));
        let nodes = render_value(self, &rendered, &scope);
        LoopSlot {
            nodes,
            scope,
            setter,
        }
    }

    fn update_loop(
        &self,
        source: &dyn LoopSource,
        region: &Arc<Region>,
        state: &Arc<Mutex<IndexMap<LoopKey, LoopSlot>>>,
        entries: Vec<LoopEntry>,
    ) {
        let mut slots = state.lock();
        let mut next = IndexMap::with_capacity(entries.len());
        let mut created = 0;
        for entry in entries {
            let slot = match slots.shift_remove(&entry.key) {
                Some(slot) => {
                    (slot.setter)(&entry);
                    slot
                }
                None => {
                    created += 1;
                    self.render_slot(source, &entry, &region.parent)
                }
            };
            next.insert(entry.key, slot);
        }
        let removed = slots.len();
        for (_, slot) in slots.drain(..) {
            slot.scope.destroy();
        }
        *slots = next;
        drop(slots);
        debug!(created, removed, "loop updated");

        let region = Arc::clone(region);
        let state = Arc::clone(state);
        self.scheduler.request_animation_frame(move || {
            let content: Vec<Node> = state
                .lock()
                .values()
                .flat_map(|slot| current_run(&slot.nodes))
                .collect();
            region.splice(&content);
        });
    }

    fn render_conditional(
        &self,
        source: &Arc<dyn ConditionalSource>,
        scope: &RenderScope,
    ) -> Vec<Node> {
        let region = self.open_region(scope);
        let gate = source.gate();
        gate.get();

        let content_scope = region.parent.child();
        let rendered = with_scope(&content_scope, || source.render());
        let content = render_value(self, &rendered, &content_scope);
        region.set_content(content_scope);

        let renderer = self.clone();
        let conditional = Arc::clone(source);
        let region_ref = Arc::clone(&region);
        scope.own(gate.subscribe(move |open: &bool| {
            trace!(open, "conditional flipped");
            let content_scope = region_ref.parent.child();
            let rendered = with_scope(&content_scope, || conditional.render());
            let content = render_value(&renderer, &rendered, &content_scope);
            region_ref.replace(content_scope, content);
        }));

        region.bracket(content)
    }
}

/// A marker-delimited region of live content.
struct Region {
    start: Node,
    end: Node,
    /// Parent of every content scope; carries the region's context values.
    parent: RenderScope,
    /// Scope of the content currently in the tree.
    content: Mutex<Option<RenderScope>>,
    /// The region's latest content, whether or not it is attached.
    tracked: Mutex<Vec<Node>>,
    /// Set once the owning scope is destroyed; later content is discarded.
    destroyed: AtomicBool,
    detached: DetachedRegions,
    scheduler: Scheduler,
}

impl Region {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn bracket(&self, content: Vec<Node>) -> Vec<Node> {
        *self.tracked.lock() = content.clone();
        let mut nodes = Vec::with_capacity(content.len() + 2);
        nodes.push(self.start.clone());
        nodes.extend(content);
        nodes.push(self.end.clone());
        nodes
    }

    fn set_content(&self, scope: RenderScope) {
        if self.is_destroyed() {
            scope.destroy();
            return;
        }
        if let Some(previous) = self.content.lock().replace(scope) {
            previous.destroy();
        }
    }

    fn destroy_content(&self) {
        if let Some(scope) = self.content.lock().take() {
            scope.destroy();
        }
    }

    /// Swap in freshly rendered content on the next frame.
    fn replace(self: &Arc<Self>, scope: RenderScope, content: Vec<Node>) {
        let region = Arc::clone(self);
        self.scheduler.request_animation_frame(move || {
            if region.is_destroyed() {
                trace!("region destroyed before its update landed");
                scope.destroy();
                return;
            }
            region.set_content(scope);
            region.splice(&content);
        });
    }

    /// The nodes currently between the markers.
    fn current(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut next = self.start.next_sibling();
        while let Some(node) = next {
            if node == self.end {
                break;
            }
            next = node.next_sibling();
            nodes.push(node);
        }
        nodes
    }

    /// Make the content between the markers exactly `content`, by identity.
    ///
    /// A detached region only records the content; [`ClientRenderer::mount`]
    /// applies it once the markers are in a tree.
    fn splice(self: &Arc<Self>, content: &[Node]) {
        if self.is_destroyed() {
            return;
        }
        *self.tracked.lock() = content.to_vec();
        if self.start.parent().is_none() {
            debug!("region is not attached; deferring patch until mount");
            let mut detached = self.detached.lock();
            if !detached.iter().any(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(self))) {
                detached.push(Arc::downgrade(self));
            }
            return;
        }
        self.patch(content);
    }

    /// Re-apply the tracked content.
    fn sync(self: &Arc<Self>) {
        let content = self.tracked.lock().clone();
        self.splice(&content);
    }

    fn patch(&self, content: &[Node]) {
        let Some(parent) = self.start.parent() else {
            return;
        };
        let keep: HashSet<&Node> = content.iter().collect();
        let old = self.current();
        let mut removed = 0;
        for node in &old {
            if !keep.contains(node) {
                node.remove();
                removed += 1;
            }
        }

        let mut anchor = self.start.clone();
        let mut moved = 0;
        for node in content {
            let next = anchor.next_sibling();
            if next.as_ref() != Some(node) {
                parent.insert_before(node, next.as_ref());
                moved += 1;
            }
            anchor = node.clone();
        }
        trace!(removed, moved, total = content.len(), "patched region");
    }
}

/// A rendered loop item.
struct LoopSlot {
    /// Top-level nodes of the item's render.
    nodes: Vec<Node>,
    scope: RenderScope,
    setter: ItemSetter,
}

/// The live run of nodes from the first to the last of `nodes`.
///
/// An item's first and last top-level nodes never change, but nested
/// regions in between can, so the run is read from the tree.
fn current_run(nodes: &[Node]) -> Vec<Node> {
    let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
        return Vec::new();
    };
    if first.parent().is_none() || first.parent() != last.parent() {
        return nodes.to_vec();
    }
    let mut run = vec![first.clone()];
    let mut current = first.clone();
    while &current != last {
        match current.next_sibling() {
            Some(next) => {
                run.push(next.clone());
                current = next;
            }
            None => return nodes.to_vec(),
        }
    }
    run
}

impl Renderer for ClientRenderer {
    type Output = Node;

    fn render_text(&self, text: &str, _scope: &RenderScope) -> Vec<Node> {
        vec![Node::text(text)]
    }

    fn render_raw(&self, raw: &Raw, _scope: &RenderScope) -> Vec<Node> {
        match parse_fragment(&raw.0) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(error = %err, "raw markup did not parse; inserting it as text");
                vec![Node::text(raw.0.as_str())]
            }
        }
    }

    fn render_comment(&self, data: &str, _scope: &RenderScope) -> Vec<Node> {
        vec![Node::comment(data)]
    }

    fn render_tag(&self, tag: &Tag, scope: &RenderScope) -> Vec<Node> {
        let element = Node::element(tag.name());
        self.apply_attributes(&element, tag, scope);

        let target = element.template_content().unwrap_or_else(|| element.clone());
        for child in tag.child_nodes() {
            for node in render_value(self, child, scope) {
                match declarative_shadow_mode(&node) {
                    Some(mode) if target == element => {
                        let shadow = element.attach_shadow(&mode);
                        if let Some(content) = node.template_content() {
                            for moved in content.children() {
                                shadow.append_child(&moved);
                            }
                        }
                    }
                    _ => target.append_child(&node),
                }
            }
        }
        vec![element]
    }

    fn render_signal(&self, signal: &dyn SignalSource, scope: &RenderScope) -> Vec<Node> {
        let region = self.open_region(scope);
        let content_scope = region.parent.child();
        let content = render_value(self, &signal.current(), &content_scope);
        region.set_content(content_scope);

        let renderer = self.clone();
        let region_ref = Arc::clone(&region);
        scope.own(signal.subscribe_render(Box::new(move |value| {
            let content_scope = region_ref.parent.child();
            let content = with_scope(&content_scope, || {
                render_value(&renderer, &value, &content_scope)
            });
            region_ref.replace(content_scope, content);
        })));

        region.bracket(content)
    }

    fn render_dynamic(&self, dynamic: &Dynamic, scope: &RenderScope) -> Vec<Node> {
        match dynamic {
            Dynamic::Loop(source) => self.render_loop(source, scope),
            Dynamic::Conditional(source) => self.render_conditional(source, scope),
        }
    }

    fn render_node(&self, node: &Node, _scope: &RenderScope) -> Vec<Node> {
        vec![node.clone()]
    }
}

/// The mode of a `<template shadowrootmode>` element.
fn declarative_shadow_mode(node: &Node) -> Option<String> {
    if node.tag_name() != Some("template") {
        return None;
    }
    node.attribute("shadowrootmode")
}
