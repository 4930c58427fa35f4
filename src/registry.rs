//! Schema registry facade.
//!
//! All schema and field mutations go through [`SchemaRegistry`], which
//! commits each change to the store and then refreshes the affected cache
//! entry before returning.

use crate::cache::SchemaCache;
use crate::config::RegistryConfig;
use crate::core::{DynError, Result};
use crate::record::BaseRecord;
use crate::schema::{FieldId, FieldSpec, FieldUpdate, Schema, SchemaField, SchemaId, SchemaKey, SchemaRow};
use crate::storage::SchemaStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, event};

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub deleted: usize,
    /// Distinct schema keys whose cache entries were flushed, once each
    pub keys: Vec<SchemaKey>,
}

#[derive(Clone)]
pub struct SchemaRegistry {
    cache: SchemaCache,
    eager_rebuild_on_delete: bool,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn SchemaStore>) -> Result<Self> {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: Arc<dyn SchemaStore>, config: RegistryConfig) -> Result<Self> {
        let cache = SchemaCache::from_config(store, &config)?;
        Ok(Self::from_cache(cache, &config))
    }

    pub fn from_cache(cache: SchemaCache, config: &RegistryConfig) -> Self {
        Self {
            cache,
            eager_rebuild_on_delete: config.eager_rebuild_on_delete,
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    fn store(&self) -> &Arc<dyn SchemaStore> {
        self.cache.store()
    }

    /// The unique schema for `key`, created empty on first use.
    pub async fn get_or_create(&self, key: &SchemaKey) -> Result<Arc<Schema>> {
        self.cache.lookup(key).await
    }

    /// Schema of base record type `T` for `discriminator`.
    pub async fn get_for<T: BaseRecord>(&self, discriminator: &str) -> Result<Arc<Schema>> {
        self.get_or_create(&SchemaKey::new(T::base_type(), discriminator)).await
    }

    /// Stored schemas of one base type.
    pub async fn list(&self, base_type: &str) -> Result<Vec<SchemaRow>> {
        self.store().list_schemas(base_type).await
    }

    /// Create a field in an already resolved schema.
    pub async fn create_field(&self, schema: &Schema, spec: FieldSpec) -> Result<SchemaField> {
        spec.validate()?;
        let field = self.store().create_field(schema.id, spec).await?;
        self.cache.rebuild(&schema.key).await?;
        Ok(field)
    }

    /// Add a field to the schema for `key`, creating the schema if needed.
    pub async fn add_field(&self, key: &SchemaKey, spec: FieldSpec) -> Result<SchemaField> {
        spec.validate()?;
        let (row, _) = self.store().get_or_create_schema(key).await?;
        let field = self.store().create_field(row.id, spec).await?;
        self.cache.rebuild(key).await?;
        Ok(field)
    }

    /// Delete every field called `name` from the schema for `key`.
    pub async fn remove_field(&self, key: &SchemaKey, name: &str) -> Result<usize> {
        let row = match self.store().get_schema(key).await {
            Ok(row) => row,
            Err(DynError::NotFound(_)) => return Ok(0),
            Err(err) => return Err(err),
        };

        let matching: Vec<FieldId> = self
            .store()
            .list_fields(row.id)
            .await?
            .into_iter()
            .filter(|field| field.name == name)
            .map(|field| field.id)
            .collect();

        for id in &matching {
            self.store().delete_field(*id).await?;
        }
        self.cache.rebuild(key).await?;
        Ok(matching.len())
    }

    /// Change the label and/or extra of a field.
    pub async fn update_field(&self, id: FieldId, update: FieldUpdate) -> Result<SchemaField> {
        let mut next = self.store().get_field(id).await?;
        next.apply(update);
        self.save_field(next).await
    }

    /// Write back an edited field.
    ///
    /// The whole save is rejected with `ImmutableFieldError` if anything but
    /// label or extra differs from the persisted version.
    pub async fn save_field(&self, field: SchemaField) -> Result<SchemaField> {
        let previous = self.store().get_field(field.id).await?;
        previous.check_mutation(&field)?;
        if !field.extra.is_object() {
            return Err(DynError::ValidationError(format!(
                "extra of field '{}' must be an object",
                field.name
            )));
        }

        let saved = self.store().update_field(field).await?;
        let row = self.store().get_schema_by_id(saved.schema_id).await?;
        self.cache.rebuild(&row.key).await?;
        Ok(saved)
    }

    pub async fn delete_field(&self, id: FieldId) -> Result<SchemaField> {
        let field = self.store().delete_field(id).await?;
        let row = self.store().get_schema_by_id(field.schema_id).await?;
        self.cache.rebuild(&row.key).await?;
        Ok(field)
    }

    /// Delete the schema for `key` and its fields.
    ///
    /// Returns false when no schema was stored; the cache entry is flushed
    /// either way.
    pub async fn delete_schema(&self, key: &SchemaKey) -> Result<bool> {
        let deleted = match self.store().get_schema(key).await {
            Ok(row) => {
                self.store().delete_schema(row.id).await?;
                true
            }
            Err(DynError::NotFound(_)) => false,
            Err(err) => return Err(err),
        };
        self.flush_deleted(key).await?;
        Ok(deleted)
    }

    /// Delete many schemas, flushing each distinct key exactly once at the end.
    ///
    /// If a delete fails, keys whose deletions already committed are flushed
    /// before the error is returned.
    pub async fn delete_schemas(&self, ids: &[SchemaId]) -> Result<BulkDeleteReport> {
        let mut keys = BTreeSet::new();
        let mut deleted = 0;
        let mut failure = None;

        for id in ids {
            match self.store().delete_schema(*id).await {
                Ok(row) => {
                    deleted += 1;
                    keys.insert(row.key);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        for key in &keys {
            self.flush_deleted(key).await?;
        }
        event!(Level::DEBUG, deleted, keys = keys.len(), "bulk schema delete");

        match failure {
            Some(err) => Err(err),
            None => Ok(BulkDeleteReport {
                deleted,
                keys: keys.into_iter().collect(),
            }),
        }
    }

    /// Delete many fields, rebuilding each affected schema exactly once.
    pub async fn delete_fields(&self, ids: &[FieldId]) -> Result<BulkDeleteReport> {
        let mut schema_ids = BTreeSet::new();
        let mut deleted = 0;
        let mut failure = None;

        for id in ids {
            match self.store().delete_field(*id).await {
                Ok(field) => {
                    deleted += 1;
                    schema_ids.insert(field.schema_id);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let mut keys = BTreeSet::new();
        for schema_id in schema_ids {
            match self.store().get_schema_by_id(schema_id).await {
                Ok(row) => {
                    keys.insert(row.key);
                }
                // deleted meanwhile; that delete flushed its own key
                Err(DynError::NotFound(_)) => {
                    event!(Level::DEBUG, schema_id = %schema_id, "schema gone before field delete flush");
                }
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        for key in &keys {
            if let Err(err) = self.cache.rebuild(key).await {
                failure.get_or_insert(err);
            }
        }
        event!(Level::DEBUG, deleted, keys = keys.len(), "bulk field delete");

        match failure {
            Some(err) => Err(err),
            None => Ok(BulkDeleteReport {
                deleted,
                keys: keys.into_iter().collect(),
            }),
        }
    }

    /// Delete every schema of `base_type`.
    pub async fn delete_all_for(&self, base_type: &str) -> Result<BulkDeleteReport> {
        let ids: Vec<SchemaId> = self.list(base_type).await?.into_iter().map(|row| row.id).collect();
        self.delete_schemas(&ids).await
    }

    async fn flush_deleted(&self, key: &SchemaKey) -> Result<()> {
        if self.eager_rebuild_on_delete {
            self.cache.rebuild(key).await?;
        } else {
            self.cache.invalidate_key(key).await?;
        }
        Ok(())
    }
}
