//! Component registry and loading.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;

use crate::error::HydrationError;
use crate::render::Renderable;

/// The future returned by [`ComponentLoader::load`].
pub type LoadFuture<'a> = BoxFuture<'a, Result<Arc<dyn Component>, HydrationError>>;

/// A hydratable component.
///
/// It receives the island's props and the forwarded children, and must
/// produce the same number of top-level nodes as it did on the server.
pub trait Component: Send + Sync {
    fn render(&self, props: &Value, children: Renderable) -> Renderable;
}

impl<F, V> Component for F
where
    F: Fn(&Value, Renderable) -> V + Send + Sync,
    V: Into<Renderable>,
{
    fn render(&self, props: &Value, children: Renderable) -> Renderable {
        self(props, children).into()
    }
}

/// Resolves component names to components, possibly asynchronously.
pub trait ComponentLoader: Send + Sync {
    fn load<'a>(&'a self, name: &'a str) -> LoadFuture<'a>;
}

/// An in-memory component table.
#[derive(Default)]
pub struct ComponentRegistry {
    components: DashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one with the same name.
    pub fn register<C>(&self, name: impl Into<String>, component: C)
    where
        C: Component + 'static,
    {
        let name = name.into();
        debug!(component = %name, "registered component");
        self.components.insert(name, Arc::new(component));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentLoader for ComponentRegistry {
    fn load<'a>(&'a self, name: &'a str) -> LoadFuture<'a> {
        let result = self.get(name).ok_or_else(|| HydrationError::UnknownComponent {
            name: name.to_string(),
        });
        future::ready(result).boxed()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.components.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("ComponentRegistry")
            .field("components", &names)
            .finish()
    }
}
