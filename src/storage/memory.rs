use super::engine::{RecordId, RecordRow, RecordStore, SchemaStore};
use crate::core::{DynError, Result};
use crate::schema::{FieldId, FieldSpec, SchemaField, SchemaId, SchemaKey, SchemaRow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Snapshot of store access counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
}

#[derive(Default)]
struct Catalog {
    schemas: BTreeMap<SchemaId, SchemaRow>,
    by_key: HashMap<SchemaKey, SchemaId>,
    fields: BTreeMap<FieldId, SchemaField>,
    next_schema_id: u64,
    next_field_id: u64,
}

#[derive(Default)]
struct RecordTable {
    rows: BTreeMap<RecordId, RecordRow>,
    next_id: u64,
}

/// In-process store backing both schemas and records.
///
/// Schemas and fields share one lock so that uniqueness checks and inserts are
/// a single step; records live under their own lock.
pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
    records: RwLock<HashMap<String, RecordTable>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            records: RwLock::new(HashMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }

    /// Number of schema rows, for tests and diagnostics
    pub async fn schema_count(&self) -> usize {
        self.catalog.read().await.schemas.len()
    }

    /// Number of field rows across all schemas
    pub async fn field_count(&self) -> usize {
        self.catalog.read().await.fields.len()
    }

    fn read_hit(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write_hit(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaStore for InMemoryStore {
    async fn get_schema(&self, key: &SchemaKey) -> Result<SchemaRow> {
        self.read_hit();
        let catalog = self.catalog.read().await;
        catalog
            .by_key
            .get(key)
            .and_then(|id| catalog.schemas.get(id))
            .cloned()
            .ok_or_else(|| DynError::NotFound(format!("Schema '{}'", key)))
    }

    async fn get_schema_by_id(&self, id: SchemaId) -> Result<SchemaRow> {
        self.read_hit();
        let catalog = self.catalog.read().await;
        catalog
            .schemas
            .get(&id)
            .cloned()
            .ok_or_else(|| DynError::NotFound(format!("Schema #{}", id)))
    }

    async fn create_schema(&self, key: &SchemaKey) -> Result<SchemaRow> {
        self.write_hit();
        let mut catalog = self.catalog.write().await;

        if catalog.by_key.contains_key(key) {
            return Err(DynError::ConstraintViolation(format!(
                "Schema '{}' already exists",
                key
            )));
        }

        catalog.next_schema_id += 1;
        let row = SchemaRow {
            id: SchemaId(catalog.next_schema_id),
            key: key.clone(),
        };
        catalog.by_key.insert(key.clone(), row.id);
        catalog.schemas.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_schema(&self, id: SchemaId) -> Result<SchemaRow> {
        self.write_hit();
        let mut catalog = self.catalog.write().await;

        let row = catalog
            .schemas
            .remove(&id)
            .ok_or_else(|| DynError::NotFound(format!("Schema #{}", id)))?;
        catalog.by_key.remove(&row.key);
        catalog.fields.retain(|_, field| field.schema_id != id);
        Ok(row)
    }

    async fn list_schemas(&self, base_type: &str) -> Result<Vec<SchemaRow>> {
        self.read_hit();
        let catalog = self.catalog.read().await;
        Ok(catalog
            .schemas
            .values()
            .filter(|row| row.key.base_type == base_type)
            .cloned()
            .collect())
    }

    async fn get_field(&self, id: FieldId) -> Result<SchemaField> {
        self.read_hit();
        let catalog = self.catalog.read().await;
        catalog
            .fields
            .get(&id)
            .cloned()
            .ok_or_else(|| DynError::NotFound(format!("Schema field #{}", id)))
    }

    async fn create_field(&self, schema_id: SchemaId, spec: FieldSpec) -> Result<SchemaField> {
        self.write_hit();
        let mut catalog = self.catalog.write().await;

        if !catalog.schemas.contains_key(&schema_id) {
            return Err(DynError::NotFound(format!("Schema #{}", schema_id)));
        }

        if catalog
            .fields
            .values()
            .any(|field| field.schema_id == schema_id && field.name == spec.name)
        {
            return Err(DynError::ConstraintViolation(format!(
                "Field '{}' already exists in schema #{}",
                spec.name, schema_id
            )));
        }

        catalog.next_field_id += 1;
        let field = SchemaField {
            id: FieldId(catalog.next_field_id),
            schema_id,
            name: spec.name,
            label: spec.label,
            field_type: spec.field_type,
            required: spec.required,
            extra: spec.extra,
            created_at: Utc::now(),
        };
        catalog.fields.insert(field.id, field.clone());
        Ok(field)
    }

    async fn update_field(&self, field: SchemaField) -> Result<SchemaField> {
        self.write_hit();
        let mut catalog = self.catalog.write().await;

        if catalog.fields.values().any(|other| {
            other.id != field.id && other.schema_id == field.schema_id && other.name == field.name
        }) {
            return Err(DynError::ConstraintViolation(format!(
                "Field '{}' already exists in schema #{}",
                field.name, field.schema_id
            )));
        }

        let slot = catalog
            .fields
            .get_mut(&field.id)
            .ok_or_else(|| DynError::NotFound(format!("Schema field #{}", field.id)))?;
        *slot = field.clone();
        Ok(field)
    }

    async fn delete_field(&self, id: FieldId) -> Result<SchemaField> {
        self.write_hit();
        let mut catalog = self.catalog.write().await;
        catalog
            .fields
            .remove(&id)
            .ok_or_else(|| DynError::NotFound(format!("Schema field #{}", id)))
    }

    async fn list_fields(&self, schema_id: SchemaId) -> Result<Vec<SchemaField>> {
        self.read_hit();
        let catalog = self.catalog.read().await;
        // BTreeMap order is id order, which is creation order
        Ok(catalog
            .fields
            .values()
            .filter(|field| field.schema_id == schema_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_record(&self, base_type: &str, row: RecordRow) -> Result<RecordId> {
        self.write_hit();
        let mut records = self.records.write().await;
        let table = records.entry(base_type.to_string()).or_default();
        table.next_id += 1;
        let id = RecordId(table.next_id);
        table.rows.insert(id, row);
        Ok(id)
    }

    async fn update_record(&self, base_type: &str, id: RecordId, row: RecordRow) -> Result<()> {
        self.write_hit();
        let mut records = self.records.write().await;
        let slot = records
            .get_mut(base_type)
            .and_then(|table| table.rows.get_mut(&id))
            .ok_or_else(|| DynError::NotFound(format!("{} #{}", base_type, id)))?;
        *slot = row;
        Ok(())
    }

    async fn get_record(&self, base_type: &str, id: RecordId) -> Result<RecordRow> {
        self.read_hit();
        let records = self.records.read().await;
        records
            .get(base_type)
            .and_then(|table| table.rows.get(&id))
            .cloned()
            .ok_or_else(|| DynError::NotFound(format!("{} #{}", base_type, id)))
    }

    async fn delete_record(&self, base_type: &str, id: RecordId) -> Result<()> {
        self.write_hit();
        let mut records = self.records.write().await;
        records
            .get_mut(base_type)
            .and_then(|table| table.rows.remove(&id))
            .map(|_| ())
            .ok_or_else(|| DynError::NotFound(format!("{} #{}", base_type, id)))
    }
}
