use super::{BaseRecord, DynamicRecord};
use crate::cache::SchemaCache;
use crate::core::Result;
use crate::storage::{RecordId, RecordStore};
use std::marker::PhantomData;
use std::sync::Arc;

/// Loads and saves dynamic records of one base type.
pub struct RecordRepository<T: BaseRecord> {
    cache: SchemaCache,
    records: Arc<dyn RecordStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: BaseRecord> Clone for RecordRepository<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            records: self.records.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: BaseRecord> RecordRepository<T> {
    pub fn new(cache: SchemaCache, records: Arc<dyn RecordStore>) -> Self {
        Self {
            cache,
            records,
            _marker: PhantomData,
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Construct an unsaved record.
    pub async fn new_record(&self, base: T) -> Result<DynamicRecord<T>> {
        DynamicRecord::new(base, &self.cache).await
    }

    /// Construct and immediately save a record.
    pub async fn create(&self, base: T) -> Result<DynamicRecord<T>> {
        let mut record = self.new_record(base).await?;
        self.save(&mut record).await?;
        Ok(record)
    }

    pub async fn load(&self, id: RecordId) -> Result<DynamicRecord<T>> {
        let row = self.records.get_record(T::base_type(), id).await?;
        DynamicRecord::hydrate(id, row, &self.cache).await
    }

    /// Insert a new record or overwrite the stored row of an existing one.
    pub async fn save(&self, record: &mut DynamicRecord<T>) -> Result<RecordId> {
        let row = record.to_row()?;
        match record.id() {
            Some(id) => {
                self.records.update_record(T::base_type(), id, row).await?;
                Ok(id)
            }
            None => {
                let id = self.records.insert_record(T::base_type(), row).await?;
                record.set_id(id);
                Ok(id)
            }
        }
    }

    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.records.delete_record(T::base_type(), id).await
    }
}
