//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! notifies two tiers of listeners when the value changes.
//!
//! # Listener Tiers
//!
//! 1. **Direct** listeners run synchronously inside [`SetSignal::set`], in
//!    registration order, before `set` returns. Derived signals use them, so a
//!    whole derivation chain is up to date as soon as the root write returns.
//!
//! 2. **Deferred** listeners are queued as independent tasks on the signal's
//!    [`Scheduler`]. DOM bindings use them so that several writes in one tick
//!    are coalesced by the host loop. No ordering is promised between the
//!    deferred callbacks of different signals.
//!
//! # Laziness
//!
//! The initial value may be a thunk. It runs on the first read, and nothing
//! is ever notified before that first read.
//!
//! # Derived Lifetimes
//!
//! A derived signal owns the subscription to its parent. The parent only
//! keeps a weak reference back, so dropping the last handle to a derived
//! signal (or calling [`Signal::dispose`]) detaches the whole chain below it.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::scheduler::Scheduler;
use super::subscription::{Subscription, SubscriptionId, Unsubscribe};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type EqFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;
type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Thunk<T> = Box<dyn FnOnce() -> T + Send>;

enum Slot<T> {
    Pending(Thunk<T>),
    Initializing,
    Ready(T),
}

struct Listener<T> {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct SignalInner<T> {
    id: u64,
    slot: Mutex<Slot<T>>,
    is_equal: EqFn<T>,
    direct: Mutex<Vec<Listener<T>>>,
    deferred: Mutex<Vec<Listener<T>>>,
    scheduler: Scheduler,
    /// Subscription to the parent, for derived signals.
    upstream: Mutex<Option<Subscription>>,
}

impl<T> SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        // The lock stays held while the initializer runs so that concurrent
        // first reads see exactly one initialization.
        let mut slot = self.slot.lock();
        let init = match std::mem::replace(&mut *slot, Slot::Initializing) {
            Slot::Pending(init) => init,
            Slot::Ready(value) => {
                let current = value.clone();
                *slot = Slot::Ready(value);
                return current;
            }
            Slot::Initializing => unreachable!("signal slot is only initializing under its lock"),
        };
        let value = init();
        *slot = Slot::Ready(value.clone());
        value
    }

    fn set(&self, value: T) {
        {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(_) | Slot::Initializing => {
                    // Nobody has read the signal yet, so nobody can be stale.
                    *slot = Slot::Ready(value);
                    return;
                }
                Slot::Ready(current) => {
                    if (self.is_equal)(current, &value) {
                        return;
                    }
                    *current = value.clone();
                }
            }
        }
        self.notify(&value);
    }

    fn notify(&self, value: &T) {
        let direct = self.direct.lock().clone();
        for listener in direct {
            if listener.active.load(Ordering::SeqCst) {
                (listener.callback)(value);
            }
        }

        let deferred = self.deferred.lock().clone();
        for listener in deferred {
            let value = value.clone();
            self.scheduler.queue_task(move || {
                if listener.active.load(Ordering::SeqCst) {
                    (listener.callback)(&value);
                }
            });
        }
    }

    /// Recompute a derived value from the previous one.
    ///
    /// Unread derived signals stay lazy: their initializer reads the parent
    /// when they are first read.
    fn recompute(&self, compute: impl FnOnce(&T) -> T) {
        let previous = match &*self.slot.lock() {
            Slot::Pending(_) | Slot::Initializing => return,
            Slot::Ready(value) => value.clone(),
        };
        let next = compute(&previous);
        self.set(next);
    }

    fn is_initialized(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Ready(_))
    }
}

impl<T> Unsubscribe for SignalInner<T>
where
    T: Send + Sync + 'static,
{
    fn unsubscribe(&self, id: SubscriptionId) {
        for list in [&self.direct, &self.deferred] {
            list.lock().retain(|listener| {
                if listener.id == id {
                    listener.active.store(false, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            });
        }
    }
}

/// A read-only handle to a reactive value.
///
/// Clones share the same value and listeners.
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

/// The write half of a signal created by [`create_signal`].
pub struct SetSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

/// Create a signal holding `value`, compared with `PartialEq`.
pub fn create_signal<T>(value: T) -> (Signal<T>, SetSignal<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    create_signal_with(value, |a: &T, b: &T| a == b)
}

/// Create a signal whose initial value is computed on first read.
pub fn create_lazy_signal<T, F>(init: F) -> (Signal<T>, SetSignal<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    build(
        Slot::Pending(Box::new(init)),
        Arc::new(|a: &T, b: &T| a == b),
        Scheduler::current(),
    )
}

/// Create a signal with a custom equality check.
///
/// `is_equal(old, new)` returning `true` suppresses the notification.
pub fn create_signal_with<T, E>(value: T, is_equal: E) -> (Signal<T>, SetSignal<T>)
where
    T: Clone + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    build(
        Slot::Pending(Box::new(move || value)),
        Arc::new(is_equal),
        Scheduler::current(),
    )
}

/// Create a signal whose deferred listeners run on `scheduler`.
pub fn create_signal_in<T>(scheduler: &Scheduler, value: T) -> (Signal<T>, SetSignal<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    build(
        Slot::Pending(Box::new(move || value)),
        Arc::new(|a: &T, b: &T| a == b),
        scheduler.clone(),
    )
}

fn build<T>(slot: Slot<T>, is_equal: EqFn<T>, scheduler: Scheduler) -> (Signal<T>, SetSignal<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let inner = Arc::new(SignalInner {
        id: next_signal_id(),
        slot: Mutex::new(slot),
        is_equal,
        direct: Mutex::new(Vec::new()),
        deferred: Mutex::new(Vec::new()),
        scheduler,
        upstream: Mutex::new(None),
    });
    (
        Signal {
            inner: Arc::clone(&inner),
        },
        SetSignal { inner },
    )
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value, running the lazy initializer on first read.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Whether the signal has been read (or written) at least once.
    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// The scheduler deferred listeners are queued on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Register a deferred listener.
    ///
    /// The callback runs as a scheduler task after each change, receiving
    /// the value that was set. A task whose subscription was cancelled
    /// before it ran does nothing.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(&self.inner.deferred, Arc::new(callback))
    }

    /// Register a direct listener, invoked synchronously inside `set`.
    pub fn subscribe_direct<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(&self.inner.direct, Arc::new(callback))
    }

    fn register(&self, list: &Mutex<Vec<Listener<T>>>, callback: Callback<T>) -> Subscription {
        let id = SubscriptionId::new();
        list.lock().push(Listener {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback,
        });
        let source: Arc<dyn Unsubscribe> = self.inner.clone();
        Subscription::new(id, source)
    }

    /// Create a signal computed from this one.
    ///
    /// `derive` receives the new parent value and the derived signal's
    /// previous value (`None` on first computation), which allows
    /// accumulators such as "last five values". Recomputation happens
    /// synchronously in the parent's `set`.
    pub fn derive<U, F>(&self, derive: F) -> Signal<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T, Option<&U>) -> U + Send + Sync + 'static,
    {
        let derive = Arc::new(derive);

        let parent = self.clone();
        let init = Arc::clone(&derive);
        let (child, _) = build::<U>(
            Slot::Pending(Box::new(move || init(&parent.get(), None))),
            Arc::new(|a: &U, b: &U| a == b),
            self.inner.scheduler.clone(),
        );

        let weak = Arc::downgrade(&child.inner);
        let upstream = self.subscribe_direct(move |value: &T| {
            if let Some(child) = weak.upgrade() {
                child.recompute(|previous| derive(value, Some(previous)));
            }
        });
        *child.inner.upstream.lock() = Some(upstream);

        child
    }

    /// Detach this signal from its parent (if derived) and drop all of its
    /// listeners. The last value stays readable.
    pub fn dispose(&self) {
        if let Some(mut upstream) = self.inner.upstream.lock().take() {
            upstream.unsubscribe();
        }
        for list in [&self.inner.direct, &self.inner.deferred] {
            for listener in list.lock().drain(..) {
                listener.active.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Number of registered listeners (direct and deferred).
    pub fn subscriber_count(&self) -> usize {
        self.inner.direct.lock().len() + self.inner.deferred.lock().len()
    }
}

impl<T> SetSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Replace the value and notify listeners unless it is equal to the
    /// current one.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// Compute the next value from the current one.
    ///
    /// The current value is read at call time, so two consecutive updates
    /// both apply.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.inner.get();
        self.inner.set(update(&current));
    }

    /// A read handle to the same signal.
    pub fn signal(&self) -> Signal<T> {
        Signal {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for SetSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Signal");
        debug.field("id", &self.inner.id);
        match &*self.inner.slot.lock() {
            Slot::Ready(value) => debug.field("value", value),
            Slot::Pending(_) | Slot::Initializing => debug.field("value", &"<uninitialized>"),
        };
        debug
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> Debug for SetSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetSignal")
            .field("id", &self.inner.id)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
