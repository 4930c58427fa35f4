// ============================================================================
// dynmodel Library
// ============================================================================

//! Records whose extra attributes are defined at runtime.
//!
//! A [`Schema`] is identified by a base record type plus a discriminator
//! value. Its fields are created and removed through the [`SchemaRegistry`]
//! while the application runs, and every mutation refreshes the schema cache
//! before returning, so the next [`DynamicRecord`] built for that key sees
//! the new field set.
//!
//! ```
//! use dynmodel::{FieldSpec, FieldType, InMemoryStore, SchemaKey, SchemaRegistry};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> dynmodel::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let registry = SchemaRegistry::new(store)?;
//!
//! let key = SchemaKey::new("Ticket", "bug");
//! registry.add_field(&key, FieldSpec::new("severity", FieldType::Integer)).await?;
//!
//! let schema = registry.get_or_create(&key).await?;
//! assert!(schema.has_field("severity"));
//! # Ok(())
//! # }
//! ```

pub mod bag;
pub mod cache;
pub mod config;
pub mod core;
pub mod form;
pub mod record;
pub mod registry;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use bag::{AttributeBag, Reconciliation};
pub use config::RegistryConfig;
pub use core::{DynError, Result, Value};
pub use registry::{BulkDeleteReport, SchemaRegistry};

pub use schema::{FieldId, FieldSpec, FieldType, FieldUpdate, Schema, SchemaField, SchemaId, SchemaKey, SchemaRow};

pub use storage::{InMemoryStore, RecordId, RecordRow, RecordStore, SchemaStore, StoreStats};

pub use cache::{CacheBackend, LruCacheBackend, MemoryCache, SchemaCache};

pub use record::{Assignment, BaseRecord, DynamicRecord, repository::RecordRepository};

pub use form::{FormData, FormErrors, FormField, SchemaBoundForm, SchemaFieldForm, Widget, WidgetTable, form_data};
