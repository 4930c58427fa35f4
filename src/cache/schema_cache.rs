use super::backend::{CacheBackend, LruCacheBackend, MemoryCache};
use crate::config::RegistryConfig;
use crate::core::Result;
use crate::schema::{Schema, SchemaKey};
use crate::storage::SchemaStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{Level, event};

/// One async mutex per cache key.
///
/// Rebuilds and invalidations of the same key run one after another, so a
/// rebuild that read the store earlier can never overwrite the snapshot of a
/// rebuild that read it later. A key's mutex is dropped from the map once no
/// caller holds or waits on it.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    async fn acquire<'a>(&'a self, cache_key: &str) -> Result<KeyGuard<'a>> {
        let handle = {
            let mut locks = self.locks.lock()?;
            locks
                .entry(cache_key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(KeyGuard {
            guard: Some(handle.lock_owned().await),
            locks: self,
            cache_key: cache_key.to_string(),
        })
    }

    fn len(&self) -> Result<usize> {
        Ok(self.locks.lock()?.len())
    }
}

struct KeyGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a KeyLocks,
    cache_key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // clones are only taken under the map lock, so a count of one means
        // nobody else holds or waits on this mutex
        if let Ok(mut locks) = self.locks.locks.lock()
            && locks
                .get(&self.cache_key)
                .is_some_and(|handle| Arc::strong_count(handle) == 1)
        {
            locks.remove(&self.cache_key);
        }
    }
}

/// Read-mostly cache of resolved schemas, kept in step with the store.
///
/// `rebuild` is the only path that writes an entry. Every mutating registry
/// operation commits to the store first and then calls `rebuild` or
/// `invalidate` for the affected key before returning.
#[derive(Clone)]
pub struct SchemaCache {
    store: Arc<dyn SchemaStore>,
    backend: Arc<dyn CacheBackend>,
    namespace: String,
    ttl: Option<Duration>,
    key_locks: Arc<KeyLocks>,
}

impl SchemaCache {
    pub fn new(store: Arc<dyn SchemaStore>, backend: Arc<dyn CacheBackend>, config: &RegistryConfig) -> Self {
        Self {
            store,
            backend,
            namespace: config.namespace.clone(),
            ttl: config.ttl,
            key_locks: Arc::new(KeyLocks::default()),
        }
    }

    /// Build the cache and the backend `config` asks for.
    pub fn from_config(store: Arc<dyn SchemaStore>, config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn CacheBackend> = match config.capacity {
            Some(capacity) => Arc::new(LruCacheBackend::new(capacity)?),
            None => Arc::new(MemoryCache::new()),
        };
        Ok(Self::new(store, backend, config))
    }

    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn cache_key(&self, key: &SchemaKey) -> String {
        key.cache_key(&self.namespace)
    }

    /// Resolve the schema for `key`, rebuilding it on a miss.
    pub async fn lookup(&self, key: &SchemaKey) -> Result<Arc<Schema>> {
        let cache_key = self.cache_key(key);

        if let Some(schema) = self.backend.get(&cache_key)? {
            event!(Level::DEBUG, cache_key = %cache_key, "schema cache hit");
            return Ok(schema);
        }

        let _guard = self.key_locks.acquire(&cache_key).await?;
        // Another caller may have rebuilt while we waited
        if let Some(schema) = self.backend.get(&cache_key)? {
            event!(Level::DEBUG, cache_key = %cache_key, "schema cache hit after wait");
            return Ok(schema);
        }

        event!(Level::DEBUG, cache_key = %cache_key, "schema cache miss");
        self.rebuild_locked(key, &cache_key).await
    }

    /// Recompute the entry for `key` from the store and overwrite it.
    ///
    /// Creates the schema row when none exists yet.
    pub async fn rebuild(&self, key: &SchemaKey) -> Result<Arc<Schema>> {
        let cache_key = self.cache_key(key);
        let _guard = self.key_locks.acquire(&cache_key).await?;
        self.rebuild_locked(key, &cache_key).await
    }

    /// Drop the entry stored under `cache_key`.
    pub async fn invalidate(&self, cache_key: &str) -> Result<bool> {
        let _guard = self.key_locks.acquire(cache_key).await?;
        let removed = self.backend.delete(cache_key)?;
        event!(Level::DEBUG, cache_key = %cache_key, removed, "schema cache invalidated");
        Ok(removed)
    }

    pub async fn invalidate_key(&self, key: &SchemaKey) -> Result<bool> {
        self.invalidate(&self.cache_key(key)).await
    }

    /// Current entry for `key`, without touching the store.
    pub fn peek(&self, key: &SchemaKey) -> Result<Option<Arc<Schema>>> {
        self.backend.get(&self.cache_key(key))
    }

    pub fn clear(&self) -> Result<()> {
        self.backend.clear()
    }

    /// Number of per-key locks currently held or waited on.
    pub fn pending_locks(&self) -> Result<usize> {
        self.key_locks.len()
    }

    async fn rebuild_locked(&self, key: &SchemaKey, cache_key: &str) -> Result<Arc<Schema>> {
        let (row, created) = self.store.get_or_create_schema(key).await?;
        if created {
            event!(Level::INFO, schema = %key, id = %row.id, "schema created");
        }

        let fields = self.store.list_fields(row.id).await?;
        let schema = Arc::new(Schema::from_row(row, fields));
        self.backend.set(cache_key, schema.clone(), self.ttl)?;

        event!(
            Level::DEBUG,
            cache_key = %cache_key,
            fields = schema.len(),
            "schema cache rebuilt"
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use crate::storage::InMemoryStore;

    fn cache_over(store: Arc<InMemoryStore>) -> SchemaCache {
        SchemaCache::from_config(store, &RegistryConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_miss_creates_and_caches() {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache_over(store.clone());
        let key = SchemaKey::new("Ticket", "bug");

        assert!(cache.peek(&key).unwrap().is_none());
        let schema = cache.lookup(&key).await.unwrap();
        assert!(schema.is_empty());
        assert_eq!(store.schema_count().await, 1);
        assert!(cache.peek(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hit_does_not_read_store() {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache_over(store.clone());
        let key = SchemaKey::untyped("Ticket");

        cache.lookup(&key).await.unwrap();
        let before = store.stats();
        cache.lookup(&key).await.unwrap();
        assert_eq!(store.stats(), before);
    }

    #[tokio::test]
    async fn test_rebuild_reflects_store() {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache_over(store.clone());
        let key = SchemaKey::untyped("Ticket");

        let schema = cache.lookup(&key).await.unwrap();
        store
            .create_field(schema.id, FieldSpec::new("severity", FieldType::Integer))
            .await
            .unwrap();

        // stale until rebuilt
        assert!(cache.lookup(&key).await.unwrap().is_empty());
        let rebuilt = cache.rebuild(&key).await.unwrap();
        assert!(rebuilt.has_field("severity"));
        assert!(cache.lookup(&key).await.unwrap().has_field("severity"));
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache_over(store);
        let key = SchemaKey::untyped("Ticket");

        cache.lookup(&key).await.unwrap();
        assert!(cache.invalidate(&cache.cache_key(&key)).await.unwrap());
        assert!(cache.peek(&key).unwrap().is_none());
        assert!(!cache.invalidate_key(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let store = Arc::new(InMemoryStore::new());
        let cache = SchemaCache::from_config(store, &RegistryConfig::new().capacity(2)).unwrap();

        for i in 0..1000 {
            let key = SchemaKey::new("Ticket", format!("kind_{}", i));
            cache.lookup(&key).await.unwrap();
            cache.invalidate_key(&key).await.unwrap();
        }

        assert_eq!(cache.pending_locks().unwrap(), 0);
        assert!(cache.backend().get(&cache.cache_key(&SchemaKey::new("Ticket", "kind_999"))).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_key_lock_survives_while_waited_on() {
        let store = Arc::new(InMemoryStore::new());
        let cache = cache_over(store);
        let key = SchemaKey::untyped("Ticket");
        let cache_key = cache.cache_key(&key);

        let first = cache.key_locks.acquire(&cache_key).await.unwrap();
        let waiter = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.rebuild(&key).await.unwrap() })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.pending_locks().unwrap(), 1);

        drop(first);
        waiter.await.unwrap();
        assert_eq!(cache.pending_locks().unwrap(), 0);
        assert!(cache.peek(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry_forces_rebuild() {
        let store = Arc::new(InMemoryStore::new());
        let config = RegistryConfig::new().ttl(Duration::from_millis(5));
        let cache = SchemaCache::from_config(store.clone(), &config).unwrap();
        let key = SchemaKey::untyped("Ticket");

        cache.lookup(&key).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.peek(&key).unwrap().is_none());

        let before = store.stats().reads;
        cache.lookup(&key).await.unwrap();
        assert!(store.stats().reads > before);
    }
}
