pub mod backend;
pub mod schema_cache;

pub use backend::{CacheBackend, LruCacheBackend, MemoryCache};
pub use schema_cache::SchemaCache;
