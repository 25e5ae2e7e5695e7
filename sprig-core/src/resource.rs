//! Shared Resources
//!
//! A [`SharedPool`] hands out one resource per key to any number of holders.
//! The first [`Lease`] for a key creates the resource; dropping the last
//! lease releases it. This is how a client keeps a single event stream per
//! endpoint no matter how many components listen to it.

use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

type ReleaseFn<K, R> = Arc<dyn Fn(&K, &R) + Send + Sync>;

struct Shared<R> {
    resource: Arc<R>,
    leases: usize,
}

struct PoolInner<K, R>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Shared<R>>,
    on_release: Option<ReleaseFn<K, R>>,
}

/// Reference-counted resources keyed by `K`.
///
/// Clones share the same pool.
pub struct SharedPool<K, R>
where
    K: Eq + Hash,
{
    inner: Arc<PoolInner<K, R>>,
}

impl<K, R> SharedPool<K, R>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                entries: DashMap::new(),
                on_release: None,
            }),
        }
    }

    /// A pool that calls `on_release` when a key's last lease is dropped,
    /// e.g. to close a connection.
    pub fn with_release<F>(on_release: F) -> Self
    where
        F: Fn(&K, &R) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                entries: DashMap::new(),
                on_release: Some(Arc::new(on_release)),
            }),
        }
    }

    /// Lease the resource for `key`, creating it with `create` if no lease
    /// for the key is outstanding.
    pub fn acquire<F>(&self, key: K, create: F) -> Lease<K, R>
    where
        F: FnOnce(&K) -> R,
    {
        let resource = match self.inner.entries.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let shared = entry.get_mut();
                shared.leases += 1;
                Arc::clone(&shared.resource)
            }
            Entry::Vacant(entry) => {
                debug!(?key, "creating shared resource");
                let resource = Arc::new(create(&key));
                entry.insert(Shared {
                    resource: Arc::clone(&resource),
                    leases: 1,
                });
                resource
            }
        };
        Lease {
            key,
            resource,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of outstanding leases for `key`.
    pub fn lease_count(&self, key: &K) -> usize {
        self.inner
            .entries
            .get(key)
            .map(|shared| shared.leases)
            .unwrap_or_default()
    }

    /// Whether a resource for `key` is alive.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl<K, R> Default for SharedPool<K, R>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, R> Clone for SharedPool<K, R>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A handle to a shared resource. Dereferences to the resource.
pub struct Lease<K, R>
where
    K: Eq + Hash,
{
    key: K,
    resource: Arc<R>,
    pool: Arc<PoolInner<K, R>>,
}

impl<K, R> Lease<K, R>
where
    K: Eq + Hash,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K, R> Deref for Lease<K, R>
where
    K: Eq + Hash,
{
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<K, R> Drop for Lease<K, R>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let released = self.pool.entries.remove_if_mut(&self.key, |_, shared| {
            shared.leases -= 1;
            shared.leases == 0
        });
        if let Some((key, shared)) = released {
            if let Some(on_release) = &self.pool.on_release {
                on_release(&key, &shared.resource);
            }
        }
    }
}

impl<K, R> fmt::Debug for Lease<K, R>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("key", &self.key).finish()
    }
}
