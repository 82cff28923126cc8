//! Cache crate
//!
//! A thread-safe, in-memory, read-through cache. Split planners own one of
//! these for discovered partitions; entries only change through an explicit
//! [`Cache::refresh`] or [`Cache::invalidate`], never implicitly.

use floe_common::Result;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;

/// A thread-safe, in-memory cache keyed by strings.
#[derive(Default)]
pub struct Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: RwLock<HashMap<String, V>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self { store: RwLock::new(HashMap::new()) }
    }

    /// Retrieves a clone of the value associated with the given key.
    pub async fn get(&self, key: &str) -> Option<V> {
        let store_guard = self.store.read().await;
        store_guard.get(key).cloned()
    }

    /// Inserts a key-value pair, overwriting any previous value.
    pub async fn put(&self, key: String, value: V) {
        let mut store_guard = self.store.write().await;
        store_guard.insert(key, value);
    }

    /// Drops the entry for `key`, returning whether one was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.store.write().await.remove(key).is_some()
    }

    /// Runs `loader` and stores its result under `key`.
    ///
    /// A failed load leaves any previous entry untouched and surfaces the
    /// loader's error unchanged.
    pub async fn refresh<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let value = loader().await?;
        self.put(key.to_string(), value.clone()).await;
        tracing::debug!(key, "cache entry refreshed");
        Ok(value)
    }

    /// Returns the cached value or calls [`Cache::refresh`] on a miss.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        self.refresh(key, loader).await
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}
