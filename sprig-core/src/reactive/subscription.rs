//! Subscription handles for the reactive system.
//!
//! Every listener registered on a signal is identified by a
//! [`SubscriptionId`]. The [`Subscription`] returned to the caller removes the
//! listener when it is cancelled or dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a listener can be removed from.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Handle to a registered listener.
///
/// Cancelling is idempotent. Dropping the handle cancels it, so keep it alive
/// for as long as the listener should fire (for render-time subscriptions the
/// renderer parks it in the active [`RenderScope`](super::RenderScope)).
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: SubscriptionId,
    source: Option<Arc<dyn Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, source: Arc<dyn Unsubscribe>) -> Self {
        Self {
            id,
            source: Some(source),
        }
    }

    /// The listener's ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the listener is still registered through this handle.
    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Remove the listener. Calling this more than once has no effect.
    pub fn unsubscribe(&mut self) {
        if let Some(source) = self.source.take() {
            source.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
