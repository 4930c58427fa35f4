use crate::core::{DynError, Result};
use crate::schema::{FieldId, FieldSpec, SchemaField, SchemaId, SchemaKey, SchemaRow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted form of a dynamic record: the base attributes as a JSON
/// document, plus the encoded attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub base: serde_json::Value,
    pub extra_fields: String,
}

/// Durable store for schemas and their fields.
///
/// Implementations must be atomic per row and must enforce uniqueness of
/// `(base_type, discriminator)` for schemas and `(schema, name)` for fields,
/// reporting conflicts as `ConstraintViolation`.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Look up a schema row by key
    async fn get_schema(&self, key: &SchemaKey) -> Result<SchemaRow>;

    async fn get_schema_by_id(&self, id: SchemaId) -> Result<SchemaRow>;

    /// Insert an empty schema row
    async fn create_schema(&self, key: &SchemaKey) -> Result<SchemaRow>;

    /// Delete a schema row and all its fields
    async fn delete_schema(&self, id: SchemaId) -> Result<SchemaRow>;

    /// All schema rows of one base type, ordered by id
    async fn list_schemas(&self, base_type: &str) -> Result<Vec<SchemaRow>>;

    async fn get_field(&self, id: FieldId) -> Result<SchemaField>;

    async fn create_field(&self, schema_id: SchemaId, spec: FieldSpec) -> Result<SchemaField>;

    async fn update_field(&self, field: SchemaField) -> Result<SchemaField>;

    async fn delete_field(&self, id: FieldId) -> Result<SchemaField>;

    /// Fields of a schema in creation order
    async fn list_fields(&self, schema_id: SchemaId) -> Result<Vec<SchemaField>>;

    /// Fetch the schema for `key`, creating it when absent.
    ///
    /// Concurrent first-time callers race on `create_schema`; the loser sees
    /// the uniqueness conflict and re-reads the winner's row.
    async fn get_or_create_schema(&self, key: &SchemaKey) -> Result<(SchemaRow, bool)> {
        match self.get_schema(key).await {
            Ok(row) => return Ok((row, false)),
            Err(DynError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        match self.create_schema(key).await {
            Ok(row) => Ok((row, true)),
            Err(DynError::ConstraintViolation(_)) => {
                warn!(schema = %key, "lost schema create race, re-reading");
                Ok((self.get_schema(key).await?, false))
            }
            Err(err) => Err(err),
        }
    }
}

/// Durable store for dynamic record rows, partitioned by base type.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_record(&self, base_type: &str, row: RecordRow) -> Result<RecordId>;

    async fn update_record(&self, base_type: &str, id: RecordId, row: RecordRow) -> Result<()>;

    async fn get_record(&self, base_type: &str, id: RecordId) -> Result<RecordRow>;

    async fn delete_record(&self, base_type: &str, id: RecordId) -> Result<()>;
}
