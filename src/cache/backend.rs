use crate::core::{DynError, Result};
use crate::schema::Schema;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Key-value cache holding resolved schemas.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Arc<Schema>>>;

    /// Store `value` under `key`; `ttl: None` never expires.
    fn set(&self, key: &str, value: Arc<Schema>, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`, returning whether it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<()>;
}

#[derive(Clone)]
struct Entry {
    value: Arc<Schema>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Arc<Schema>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Unbounded map cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Arc<Schema>>> {
        {
            let entries = self.entries.read()?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write()?;
        if entries.get(key).is_some_and(Entry::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: Arc<Schema>, ttl: Option<Duration>) -> Result<()> {
        self.entries.write()?.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write()?.remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }
}

/// Bounded cache evicting the least recently used schema.
pub struct LruCacheBackend {
    entries: Mutex<LruCache<String, Entry>>,
}

impl LruCacheBackend {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| DynError::ConfigError("cache capacity must be > 0".to_string()))?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl CacheBackend for LruCacheBackend {
    fn get(&self, key: &str) -> Result<Option<Arc<Schema>>> {
        let mut entries = self.entries.lock()?;
        let found = entries
            .get(key)
            .map(|entry| (entry.is_expired(), entry.value.clone()));
        match found {
            None => Ok(None),
            Some((false, value)) => Ok(Some(value)),
            Some((true, _)) => {
                entries.pop(key);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: Arc<Schema>, ttl: Option<Duration>) -> Result<()> {
        self.entries.lock()?.put(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock()?.pop(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock()?.clear();
        Ok(())
    }
}
