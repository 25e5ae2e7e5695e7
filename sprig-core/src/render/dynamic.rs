//! Dynamic Content
//!
//! [`each`] and [`conditional`] build descriptors of signal-driven
//! repetition and branching. They render nothing themselves; the renderers
//! interpret them.
//!
//! Both descriptors are type-erased behind [`LoopSource`] and
//! [`ConditionalSource`] so that [`Renderable`] stays a single closed enum.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::warn;

use super::renderable::Renderable;
use crate::reactive::{create_signal_in, Signal, Subscription};

/// A loop or a conditional.
#[derive(Clone)]
pub enum Dynamic {
    Loop(Arc<dyn LoopSource>),
    Conditional(Arc<dyn ConditionalSource>),
}

impl Dynamic {
    /// Whether both refer to the same loop or conditional.
    pub fn same_source(&self, other: &Dynamic) -> bool {
        match (self, other) {
            (Dynamic::Loop(a), Dynamic::Loop(b)) => same_arc(a, b),
            (Dynamic::Conditional(a), Dynamic::Conditional(b)) => same_arc(a, b),
            _ => false,
        }
    }
}

/// Pointer identity, ignoring vtables.
pub(crate) fn same_arc<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Loop(_) => write!(f, "Loop(..)"),
            Dynamic::Conditional(_) => write!(f, "Conditional(..)"),
        }
    }
}

// ----------------------------------------------------------------------------
// Keys
// ----------------------------------------------------------------------------

trait KeyValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn KeyValue) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K> KeyValue for K
where
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn KeyValue) -> bool {
        other.as_any().downcast_ref::<K>() == Some(self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A loop item key with its concrete type erased.
#[derive(Clone)]
pub struct LoopKey(Arc<dyn KeyValue>);

impl LoopKey {
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(key))
    }

    /// The key as its concrete type.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl PartialEq for LoopKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for LoopKey {}

impl Hash for LoopKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for LoopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

// ----------------------------------------------------------------------------
// Loop
// ----------------------------------------------------------------------------

/// One item of a loop snapshot.
#[derive(Clone)]
pub struct LoopEntry {
    pub key: LoopKey,
    item: Arc<dyn Any + Send + Sync>,
}

impl LoopEntry {
    /// The item as its concrete type.
    pub fn item<T: 'static>(&self) -> Option<&T> {
        self.item.downcast_ref::<T>()
    }
}

impl fmt::Debug for LoopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopEntry").field("key", &self.key).finish()
    }
}

/// Pushes a new item value into a rendered loop item.
pub type ItemSetter = Box<dyn Fn(&LoopEntry) + Send + Sync>;

/// The erased interface renderers use to drive a loop.
pub trait LoopSource: Send + Sync {
    /// The current items, keyed, in order. Duplicate keys are skipped.
    fn entries(&self) -> Vec<LoopEntry>;

    /// Render one item through its own item signal.
    ///
    /// Returns the renderable and a setter that updates the item signal.
    fn render_entry(&self, entry: &LoopEntry) -> (Renderable, ItemSetter);

    /// Register a deferred listener receiving each new snapshot.
    fn subscribe_entries(
        &self,
        callback: Box<dyn Fn(Vec<LoopEntry>) + Send + Sync>,
    ) -> Subscription;
}

type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;
type ItemFn<T, K> = Arc<dyn Fn(Signal<T>, &K) -> Renderable + Send + Sync>;

struct Loop<T, K>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<Vec<T>>,
    get_key: KeyFn<T, K>,
    render_item: ItemFn<T, K>,
}

fn to_entries<T, K>(items: &[T], get_key: &KeyFn<T, K>) -> Vec<LoopEntry>
where
    T: Clone + Send + Sync + 'static,
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    let mut seen = HashSet::with_capacity(items.len());
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let key = LoopKey::new(get_key(item));
        if !seen.insert(key.clone()) {
            warn!(?key, "duplicate loop key; skipping item");
            continue;
        }
        entries.push(LoopEntry {
            key,
            item: Arc::new(item.clone()),
        });
    }
    entries
}

impl<T, K> LoopSource for Loop<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn entries(&self) -> Vec<LoopEntry> {
        to_entries(&self.signal.get(), &self.get_key)
    }

    fn render_entry(&self, entry: &LoopEntry) -> (Renderable, ItemSetter) {
        let (Some(item), Some(key)) = (entry.item::<T>(), entry.key.downcast_ref::<K>()) else {
            warn!(key = ?entry.key, "loop entry does not belong to this loop");
            return (Renderable::Empty, Box::new(|_| {}));
        };
        let (item_signal, set_item) = create_signal_in(self.signal.scheduler(), item.clone());
        let rendered = (self.render_item)(item_signal, key);
        let setter: ItemSetter = Box::new(move |entry| {
            if let Some(item) = entry.item::<T>() {
                set_item.set(item.clone());
            }
        });
        (rendered, setter)
    }

    fn subscribe_entries(
        &self,
        callback: Box<dyn Fn(Vec<LoopEntry>) + Send + Sync>,
    ) -> Subscription {
        let get_key = Arc::clone(&self.get_key);
        self.signal
            .subscribe(move |items: &Vec<T>| callback(to_entries(items, &get_key)))
    }
}

/// Render one item per element of `signal`, matched across updates by key.
///
/// Items whose key survives an update keep their rendered nodes; the new
/// value is pushed into the item's signal instead of calling `render_item`
/// again.
pub fn each<T, K, G, R, V>(signal: &Signal<Vec<T>>, get_key: G, render_item: R) -> Renderable
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    G: Fn(&T) -> K + Send + Sync + 'static,
    R: Fn(Signal<T>, &K) -> V + Send + Sync + 'static,
    V: Into<Renderable>,
{
    let source = Loop {
        signal: signal.clone(),
        get_key: Arc::new(get_key),
        render_item: Arc::new(move |item, key: &K| render_item(item, key).into()),
    };
    Renderable::Dynamic(Dynamic::Loop(Arc::new(source)))
}

// ----------------------------------------------------------------------------
// Conditional
// ----------------------------------------------------------------------------

/// The erased interface renderers use to drive a conditional.
pub trait ConditionalSource: Send + Sync {
    /// A fresh signal of the predicate's result. It only notifies when the
    /// result flips.
    fn gate(&self) -> Signal<bool>;

    /// Invoke the render callback.
    fn render(&self) -> Renderable;
}

struct Conditional<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    render_item: Arc<dyn Fn(Signal<T>) -> Renderable + Send + Sync>,
}

impl<T> ConditionalSource for Conditional<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn gate(&self) -> Signal<bool> {
        let predicate = Arc::clone(&self.predicate);
        self.signal.derive(move |value, _| predicate(value))
    }

    fn render(&self) -> Renderable {
        (self.render_item)(self.signal.clone())
    }
}

/// Render `render_item(signal)` and render it again each time
/// `predicate(value)` changes its result.
///
/// Updates that leave the predicate's result unchanged leave the rendered
/// content alone; `render_item` receives the signal and can bind finer
/// updates itself.
pub fn conditional<T, P, R, V>(signal: &Signal<T>, predicate: P, render_item: R) -> Renderable
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
    R: Fn(Signal<T>) -> V + Send + Sync + 'static,
    V: Into<Renderable>,
{
    let source = Conditional {
        signal: signal.clone(),
        predicate: Arc::new(predicate),
        render_item: Arc::new(move |signal| render_item(signal).into()),
    };
    Renderable::Dynamic(Dynamic::Conditional(Arc::new(source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_signal, Scheduler};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        name: &'static str,
    }

    fn loop_source(renderable: Renderable) -> Arc<dyn LoopSource> {
        match renderable {
            Renderable::Dynamic(Dynamic::Loop(source)) => source,
            other => panic!("expected a loop, got {other:?}"),
        }
    }

    #[test]
    fn loop_keys_compare_by_value_and_type() {
        assert_eq!(LoopKey::new(1u32), LoopKey::new(1u32));
        assert_ne!(LoopKey::new(1u32), LoopKey::new(2u32));
        assert_ne!(LoopKey::new(1u32), LoopKey::new(1u64));
        assert_eq!(LoopKey::new("a").downcast_ref::<&str>(), Some(&"a"));
    }

    #[test]
    fn duplicate_keys_are_skipped() {
        let (rows, _) = create_signal(vec![
            Row { id: 1, name: "a" },
            Row { id: 1, name: "dup" },
            Row { id: 2, name: "b" },
        ]);
        let source = loop_source(each(&rows, |row| row.id, |_, _| Renderable::Empty));

        let entries = source.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].item::<Row>().map(|r| r.name), Some("a"));
        assert_eq!(entries[1].key, LoopKey::new(2u32));
    }

    #[test]
    fn item_setter_updates_item_signal() {
        let (rows, _) = create_signal(vec![Row { id: 1, name: "a" }]);
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let inner = seen.clone();
        let source = loop_source(each(&rows, |row| row.id, move |item, _| {
            *inner.lock() = Some(item.clone());
            Renderable::Empty
        }));

        let entry = source.entries().remove(0);
        let (_, setter) = source.render_entry(&entry);
        let item = seen.lock().clone().unwrap();
        assert_eq!(item.get().name, "a");

        let key: KeyFn<Row, u32> = Arc::new(|r: &Row| r.id);
        let renamed = to_entries(&[Row { id: 1, name: "renamed" }], &key);
        setter(&renamed[0]);
        assert_eq!(item.get().name, "renamed");
    }

    #[test]
    fn gate_notifies_only_on_flip() {
        let scheduler = Scheduler::new();
        let (value, set_value) = create_signal_in(&scheduler, 1);
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let inner = calls.clone();
        let Renderable::Dynamic(Dynamic::Conditional(source)) = conditional(
            &value,
            |v| *v > 0,
            move |_| {
                inner.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Renderable::Empty
            },
        ) else {
            panic!("expected a conditional");
        };

        let gate = source.gate();
        assert!(gate.get());
        let flips = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = flips.clone();
        let _sub = gate.subscribe_direct(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        set_value.set(2);
        assert_eq!(flips.load(std::sync::atomic::Ordering::SeqCst), 0);
        set_value.set(-1);
        assert_eq!(flips.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!gate.get());

        source.render();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
