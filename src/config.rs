use crate::core::{DynError, Result};
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "dynmodel_schema";

/// Schema registry configuration
///
/// Controls how resolved schemas are cached and how deletes are reflected in
/// the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Tag prefixed to every cache key
    pub namespace: String,

    /// Expiry for cached schemas. `None` keeps entries until the next rebuild
    pub ttl: Option<Duration>,

    /// Bound on cached schemas. `None` uses an unbounded map
    pub capacity: Option<usize>,

    /// Rebuild a deleted schema's entry to an empty schema instead of removing it
    pub eager_rebuild_on_delete: bool,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: None,
            capacity: None,
            eager_rebuild_on_delete: false,
        }
    }

    /// Set the cache key namespace
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Set cache entry expiry
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Bound the cache to `capacity` schemas (LRU eviction)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn eager_rebuild_on_delete(mut self, eager: bool) -> Self {
        self.eager_rebuild_on_delete = eager;
        self
    }

    /// Parse from a config URL
    ///
    /// Format: "dynmodel://namespace?ttl=secs&capacity=n&eager_rebuild=bool".
    /// `ttl_ms=millis` may be given instead of `ttl`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynmodel::RegistryConfig;
    ///
    /// let config = RegistryConfig::from_url("dynmodel://tickets?capacity=256").unwrap();
    /// assert_eq!(config.namespace, "tickets");
    /// assert_eq!(config.capacity, Some(256));
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("dynmodel://")
            .ok_or_else(|| DynError::ConfigError("URL must start with 'dynmodel://'".to_string()))?;

        let (namespace, query) = match rest.split_once('?') {
            Some((namespace, query)) => (namespace, Some(query)),
            None => (rest, None),
        };

        let mut config = Self::new();
        if !namespace.is_empty() {
            config = config.namespace(namespace);
        }

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DynError::ConfigError(format!("Invalid parameter '{}'", pair)))?;

            match key {
                "ttl" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| DynError::ConfigError(format!("Invalid ttl '{}'", value)))?;
                    config = config.ttl(Duration::from_secs(secs));
                }
                "ttl_ms" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| DynError::ConfigError(format!("Invalid ttl_ms '{}'", value)))?;
                    config = config.ttl(Duration::from_millis(millis));
                }
                "capacity" => {
                    let capacity: usize = value
                        .parse()
                        .map_err(|_| DynError::ConfigError(format!("Invalid capacity '{}'", value)))?;
                    config = config.capacity(capacity);
                }
                "eager_rebuild" => {
                    let eager: bool = value.parse().map_err(|_| {
                        DynError::ConfigError(format!("Invalid eager_rebuild '{}'", value))
                    })?;
                    config = config.eager_rebuild_on_delete(eager);
                }
                other => {
                    return Err(DynError::ConfigError(format!("Unknown parameter '{}'", other)));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to config URL
    pub fn to_url(&self) -> String {
        let mut params = Vec::new();
        if let Some(ttl) = self.ttl {
            if ttl.subsec_nanos() == 0 {
                params.push(format!("ttl={}", ttl.as_secs()));
            } else {
                params.push(format!("ttl_ms={}", ttl.as_millis()));
            }
        }
        if let Some(capacity) = self.capacity {
            params.push(format!("capacity={}", capacity));
        }
        if self.eager_rebuild_on_delete {
            params.push("eager_rebuild=true".to_string());
        }

        if params.is_empty() {
            format!("dynmodel://{}", self.namespace)
        } else {
            format!("dynmodel://{}?{}", self.namespace, params.join("&"))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(DynError::ConfigError("namespace cannot be empty".to_string()));
        }

        if self.capacity == Some(0) {
            return Err(DynError::ConfigError("capacity must be > 0".to_string()));
        }

        if let Some(ttl) = self.ttl {
            if ttl.is_zero() {
                return Err(DynError::ConfigError("ttl must be > 0".to_string()));
            }
            if ttl.subsec_nanos() % 1_000_000 != 0 {
                return Err(DynError::ConfigError(
                    "ttl must be a whole number of milliseconds".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}
