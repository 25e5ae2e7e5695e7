//! Render Scopes
//!
//! A render scope collects the cleanup work of one render pass: signal
//! subscriptions, ref callbacks, and anything a component registers with
//! [`use_on_destroy`]. Destroying the scope runs all of it.
//!
//! Scopes form a tree. The renderer threads a scope explicitly through the
//! walk and gives every independently destroyable region (a loop item, a
//! signal re-render) its own child scope, so tearing down one item never
//! touches its siblings.
//!
//! # Ambient Access
//!
//! Component code does not receive the scope as a parameter. While user
//! callbacks run, the renderer enters the scope on a thread-local stack
//! (guard-managed, like a call stack), which is what [`use_on_destroy`] and
//! [`consume`] look at. Rendering on different threads therefore never mixes
//! frames.
//!
//! Scopes also carry typed context values. A child scope starts with a copy
//! of its parent's values.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::subscription::Subscription;
use crate::error::RenderError;

type DestroyFn = Box<dyn FnOnce() + Send + 'static>;
type ContextMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<RenderScope>> = const { RefCell::new(Vec::new()) };
}

/// Unique identifier for a render scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct ScopeInner {
    id: ScopeId,
    on_destroy: Mutex<Vec<DestroyFn>>,
    contexts: Mutex<ContextMap>,
    destroyed: AtomicBool,
}

/// A capture frame for destroy callbacks and context values.
///
/// Clones refer to the same frame.
#[derive(Clone)]
pub struct RenderScope {
    inner: Arc<ScopeInner>,
}

impl RenderScope {
    /// Create a root scope.
    pub fn new() -> Self {
        Self::with_contexts(ContextMap::new())
    }

    fn with_contexts(contexts: ContextMap) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: ScopeId::new(),
                on_destroy: Mutex::new(Vec::new()),
                contexts: Mutex::new(contexts),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// The scope's unique ID.
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    /// Create a child scope inheriting this scope's context values.
    ///
    /// The child is not destroyed with the parent automatically; callers that
    /// want that register `child.destroy()` on the parent.
    pub fn child(&self) -> RenderScope {
        RenderScope::with_contexts(self.inner.contexts.lock().clone())
    }

    /// Register a callback to run when the scope is destroyed.
    ///
    /// Registering on an already destroyed scope runs the callback at once.
    pub fn on_destroy(&self, callback: impl FnOnce() + Send + 'static) {
        if self.is_destroyed() {
            callback();
            return;
        }
        self.inner.on_destroy.lock().push(Box::new(callback));
    }

    /// Keep `subscription` alive until the scope is destroyed.
    pub fn own(&self, subscription: Subscription) {
        self.on_destroy(move || drop(subscription));
    }

    /// Run and discard every registered callback, in registration order.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        let callbacks: Vec<DestroyFn> = self.inner.on_destroy.lock().drain(..).collect();
        trace!(scope = ?self.inner.id, callbacks = callbacks.len(), "destroying render scope");
        for callback in callbacks {
            callback();
        }
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of callbacks waiting for destruction.
    pub fn pending_callbacks(&self) -> usize {
        self.inner.on_destroy.lock().len()
    }

    /// Store a context value, replacing any value of the same type.
    pub fn provide<T>(&self, value: T)
    where
        T: Any + Send + Sync,
    {
        self.inner
            .contexts
            .lock()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Read a context value of type `T`.
    pub fn context<T>(&self) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        self.inner
            .contexts
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Make this scope the ambient scope of the calling thread until the
    /// returned guard is dropped.
    pub fn enter(&self) -> ScopeGuard {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        ScopeGuard { id: self.inner.id }
    }

    /// The innermost entered scope on this thread, if any.
    pub fn current() -> Option<RenderScope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

impl Default for RenderScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScope")
            .field("id", &self.inner.id)
            .field("pending_callbacks", &self.pending_callbacks())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Guard that pops the ambient scope when dropped.
///
/// This keeps the stack balanced even if the component panics.
pub struct ScopeGuard {
    id: ScopeId,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(scope) = popped {
                debug_assert_eq!(
                    scope.id(),
                    self.id,
                    "RenderScope mismatch: expected {:?}, got {:?}",
                    self.id,
                    scope.id()
                );
            }
        });
    }
}

/// Register a cleanup callback on the ambient render scope.
///
/// # Panics
///
/// Panics when called outside a render (no ambient scope). Use
/// [`try_use_on_destroy`] to handle that case.
pub fn use_on_destroy(callback: impl FnOnce() + Send + 'static) {
    if let Err(err) = try_use_on_destroy(callback) {
        panic!("{err}");
    }
}

/// Register a cleanup callback on the ambient render scope, failing when
/// there is none.
pub fn try_use_on_destroy(callback: impl FnOnce() + Send + 'static) -> Result<(), RenderError> {
    let scope = RenderScope::current().ok_or(RenderError::NoCaptureContext)?;
    scope.on_destroy(callback);
    Ok(())
}

/// Provide a context value to the ambient scope and everything rendered
/// below it.
pub fn provide_context<T>(value: T) -> Result<(), RenderError>
where
    T: Any + Send + Sync,
{
    let scope = RenderScope::current().ok_or(RenderError::NoRenderContext)?;
    scope.provide(value);
    Ok(())
}

/// Read a context value from the ambient scope.
pub fn consume<T>() -> Result<Option<T>, RenderError>
where
    T: Any + Clone + Send + Sync,
{
    let scope = RenderScope::current().ok_or(RenderError::NoRenderContext)?;
    Ok(scope.context::<T>())
}
