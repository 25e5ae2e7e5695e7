//! Tag Model
//!
//! A [`Tag`] is an immutable description of one element: its name, its
//! attributes and its children. Building a tag has no side effects; nothing
//! happens until a renderer walks it.
//!
//! Every HTML element has a factory function (`tags::div()`,
//! `tags::span()`, ...) and [`factory`] looks them up by name.
//!
//! ```rust,ignore
//! use sprig_core::tags::{button, div};
//!
//! let view = div()
//!     .class("counter")
//!     .child(count.clone())
//!     .child(button().on("click", move |_| set_count.update(|n| n + 1)).child("+"));
//! ```

mod elements;

use std::fmt;
use std::sync::Arc;

pub use elements::*;

use crate::dom::{Event, EventHandler, Node};
use crate::reactive::{Signal, Subscription};
use crate::render::Renderable;

/// Callback receiving the rendered element, and `None` when it is destroyed.
pub type NodeRef = Arc<dyn Fn(Option<&Node>) + Send + Sync>;

/// A value that can be written into an attribute.
///
/// `None` means the attribute is absent.
pub trait AttrLiteral {
    fn to_attr(&self) -> Option<String>;
}

impl AttrLiteral for String {
    fn to_attr(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl AttrLiteral for &str {
    fn to_attr(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

impl AttrLiteral for bool {
    fn to_attr(&self) -> Option<String> {
        self.then(String::new)
    }
}

impl<T: AttrLiteral> AttrLiteral for Option<T> {
    fn to_attr(&self) -> Option<String> {
        self.as_ref().and_then(AttrLiteral::to_attr)
    }
}

macro_rules! impl_attr_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AttrLiteral for $ty {
                fn to_attr(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

impl_attr_display!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);

/// A type-erased signal bound to an attribute or style property.
pub trait AttrSource: Send + Sync {
    fn current(&self) -> Option<String>;

    /// Register a deferred listener receiving each new value.
    fn subscribe_attr(&self, callback: Box<dyn Fn(Option<String>) + Send + Sync>)
        -> Subscription;
}

impl<T> AttrSource for Signal<T>
where
    T: AttrLiteral + Clone + Send + Sync + 'static,
{
    fn current(&self) -> Option<String> {
        self.get().to_attr()
    }

    fn subscribe_attr(
        &self,
        callback: Box<dyn Fn(Option<String>) + Send + Sync>,
    ) -> Subscription {
        self.subscribe(move |value: &T| callback(value.to_attr()))
    }
}

/// One style property value.
#[derive(Clone)]
pub enum StyleValue {
    Static(String),
    Bound(Arc<dyn AttrSource>),
}

/// An attribute value.
#[derive(Clone)]
pub enum AttrValue {
    Text(String),
    /// Present (`name=""`) when true, absent when false.
    Bool(bool),
    /// Follows a signal.
    Bound(Arc<dyn AttrSource>),
    /// Style properties in declaration order.
    Style(Vec<(String, StyleValue)>),
    /// An event handler; the attribute name is `on` + event name.
    Handler(EventHandler),
    Ref(NodeRef),
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            AttrValue::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            AttrValue::Bound(_) => write!(f, "Bound(..)"),
            AttrValue::Style(props) => f
                .debug_list()
                .entries(props.iter().map(|(name, _)| name))
                .finish(),
            AttrValue::Handler(_) => write!(f, "Handler(..)"),
            AttrValue::Ref(_) => write!(f, "Ref(..)"),
        }
    }
}

/// Map attribute aliases to their HTML names.
fn attribute_name(name: &str) -> String {
    match name {
        "className" => "class".to_string(),
        "htmlFor" => "for".to_string(),
        _ => name.to_string(),
    }
}

/// An immutable element description.
#[derive(Clone)]
pub struct Tag {
    name: Arc<str>,
    attributes: Vec<(String, AttrValue)>,
    children: Vec<Renderable>,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name.to_ascii_lowercase()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, AttrValue)] {
        &self.attributes
    }

    pub fn child_nodes(&self) -> &[Renderable] {
        &self.children
    }

    /// The attribute with the given name, if set.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    fn with_attribute(mut self, name: String, value: AttrValue) -> Self {
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Set a static attribute. `className` is an alias of `class`; a `None`
    /// or `false` value leaves the attribute out.
    pub fn attr(self, name: &str, value: impl AttrLiteral) -> Self {
        let name = attribute_name(name);
        match value.to_attr() {
            Some(value) => self.with_attribute(name, AttrValue::Text(value)),
            None => self,
        }
    }

    pub fn class(self, value: impl AttrLiteral) -> Self {
        self.attr("class", value)
    }

    pub fn id(self, value: impl AttrLiteral) -> Self {
        self.attr("id", value)
    }

    /// A boolean attribute such as `disabled` or `data-hydrate`.
    pub fn bool_attr(self, name: &str, value: bool) -> Self {
        self.with_attribute(attribute_name(name), AttrValue::Bool(value))
    }

    /// Bind an attribute to a signal.
    pub fn bind<T>(self, name: &str, signal: &Signal<T>) -> Self
    where
        T: AttrLiteral + Clone + Send + Sync + 'static,
    {
        self.with_attribute(attribute_name(name), AttrValue::Bound(Arc::new(signal.clone())))
    }

    fn with_style(self, property: &str, value: StyleValue) -> Self {
        let mut props = match self.attribute("style") {
            Some(AttrValue::Style(props)) => props.clone(),
            _ => Vec::new(),
        };
        match props.iter_mut().find(|(name, _)| name == property) {
            Some((_, existing)) => *existing = value,
            None => props.push((property.to_string(), value)),
        }
        self.with_attribute("style".to_string(), AttrValue::Style(props))
    }

    /// Set a style property. camelCase names are converted to kebab-case
    /// when rendered; `--custom` properties are kept as written.
    pub fn style(self, property: &str, value: impl Into<String>) -> Self {
        self.with_style(property, StyleValue::Static(value.into()))
    }

    /// Bind a style property to a signal. A `None` value removes it.
    pub fn bind_style<T>(self, property: &str, signal: &Signal<T>) -> Self
    where
        T: AttrLiteral + Clone + Send + Sync + 'static,
    {
        self.with_style(property, StyleValue::Bound(Arc::new(signal.clone())))
    }

    /// Attach an event handler. Accepts `click` or `onClick`.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let event = event.strip_prefix("on").unwrap_or(event).to_ascii_lowercase();
        self.with_attribute(format!("on{event}"), AttrValue::Handler(Arc::new(handler)))
    }

    /// Receive the rendered element (client only).
    pub fn node_ref<F>(self, callback: F) -> Self
    where
        F: Fn(Option<&Node>) + Send + Sync + 'static,
    {
        self.with_attribute("ref".to_string(), AttrValue::Ref(Arc::new(callback)))
    }

    /// Append a child. Lists are flattened by the renderers; empty values
    /// render nothing.
    pub fn child(mut self, child: impl Into<Renderable>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Renderable>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("children", &self.children)
            .finish()
    }
}

/// Convert a style property name to its CSS form.
pub fn css_property_name(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::create_signal;

    #[test]
    fn builders_do_not_share_state() {
        let base = div().class("card");
        let a = base.clone().id("a");
        let b = base.child("text");

        assert!(a.attribute("id").is_some());
        assert!(b.attribute("id").is_none());
        assert_eq!(b.child_nodes().len(), 1);
        assert!(a.child_nodes().is_empty());
    }

    #[test]
    fn class_name_aliases_class() {
        let tag = span().attr("className", "x");
        assert!(matches!(tag.attribute("class"), Some(AttrValue::Text(v)) if v == "x"));
        assert!(tag.attribute("className").is_none());
    }

    #[test]
    fn absent_attribute_values_are_skipped() {
        let tag = input().attr("placeholder", None::<&str>).attr("hidden", false);
        assert!(tag.attributes().is_empty());
    }

    #[test]
    fn style_properties_accumulate() {
        let (width, _) = create_signal(Some("10px".to_string()));
        let tag = div()
            .style("color", "red")
            .bind_style("width", &width)
            .style("color", "blue");
        let Some(AttrValue::Style(props)) = tag.attribute("style") else {
            panic!("expected style attribute");
        };
        assert_eq!(props.len(), 2);
        assert!(matches!(&props[0].1, StyleValue::Static(v) if v == "blue"));
        assert!(matches!(
            &props[1].1,
            StyleValue::Bound(source) if source.current().as_deref() == Some("10px")
        ));
    }

    #[test]
    fn handlers_are_keyed_by_lowercase_event() {
        let tag = button().on("onClick", |_| {});
        assert!(matches!(tag.attribute("onclick"), Some(AttrValue::Handler(_))));
    }

    #[test]
    fn css_names() {
        assert_eq!(css_property_name("backgroundColor"), "background-color");
        assert_eq!(css_property_name("--mainGap"), "--mainGap");
        assert_eq!(css_property_name("margin"), "margin");
    }
}
