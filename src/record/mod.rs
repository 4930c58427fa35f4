//! Records whose extra attributes follow a runtime schema.
//!
//! A base type implements [`BaseRecord`]; wrapping it in [`DynamicRecord`]
//! resolves its schema through the [`SchemaCache`] and keeps the attached
//! [`AttributeBag`] in step with that schema.

pub mod repository;

pub use repository::RecordRepository;

use crate::bag::AttributeBag;
use crate::cache::SchemaCache;
use crate::core::{DynError, Result, Value};
use crate::schema::{FieldType, Schema, SchemaKey};
use crate::storage::{RecordId, RecordRow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{Level, event};

/// The fixed, statically declared part of a dynamic record.
pub trait BaseRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Fully qualified name used as the schema's base type.
    fn base_type() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Names of the attributes the base type declares itself.
    fn declared_attributes() -> &'static [&'static str];

    /// Read a declared attribute by name; `None` for undeclared names.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Assign a declared attribute by name.
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()>;

    /// Name of the declared attribute holding the discriminator. `None`
    /// makes every instance use the type-less schema.
    fn schema_type_descriptor() -> Option<&'static str> {
        None
    }

    /// Declared attributes that bound forms may edit.
    fn form_attributes() -> &'static [&'static str] {
        &[]
    }

    fn is_declared(name: &str) -> bool {
        Self::declared_attributes().contains(&name)
    }
}

/// Where [`DynamicRecord::set`] put a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Base,
    Bag,
    /// Instance-local state that is never persisted
    Transient,
}

pub struct DynamicRecord<T: BaseRecord> {
    id: Option<RecordId>,
    base: T,
    bag: AttributeBag,
    schema: Arc<Schema>,
    transient: HashMap<String, Value>,
}

impl<T: BaseRecord> DynamicRecord<T> {
    /// Construct a fresh, unsaved record.
    pub async fn new(base: T, cache: &SchemaCache) -> Result<Self> {
        Self::assemble(None, base, AttributeBag::new(), cache).await
    }

    /// Rebuild a record from its stored row. An undecodable bag or base
    /// document fails the whole load.
    pub async fn hydrate(id: RecordId, row: RecordRow, cache: &SchemaCache) -> Result<Self> {
        let base: T = serde_json::from_value(row.base)
            .map_err(|err| DynError::DecodeError(format!("{} #{}: {}", T::base_type(), id, err)))?;
        let bag = AttributeBag::decode(&row.extra_fields)?;
        Self::assemble(Some(id), base, bag, cache).await
    }

    async fn assemble(id: Option<RecordId>, base: T, mut bag: AttributeBag, cache: &SchemaCache) -> Result<Self> {
        let key = SchemaKey::new(T::base_type(), discriminator_of(&base));
        let schema = cache.lookup(&key).await?;

        let report = bag.reconcile(schema.field_names());
        if !report.removed.is_empty() {
            event!(
                Level::DEBUG,
                schema = %schema.key,
                removed = ?report.removed,
                "dropped stale attributes"
            );
        }

        Ok(Self {
            id,
            base,
            bag,
            schema,
            transient: HashMap::new(),
        })
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn base(&self) -> &T {
        &self.base
    }

    /// Typed access to the base fields.
    pub fn base_mut(&mut self) -> &mut T {
        &mut self.base
    }

    pub fn into_base(self) -> T {
        self.base
    }

    pub fn bag(&self) -> &AttributeBag {
        &self.bag
    }

    /// The schema snapshot resolved at construction.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn discriminator(&self) -> &str {
        self.schema.discriminator()
    }

    /// Base attribute, then schema attribute, then transient state.
    pub fn get(&self, name: &str) -> Result<Value> {
        if T::is_declared(name)
            && let Some(value) = self.base.attribute(name)
        {
            return Ok(value);
        }
        if let Some(value) = self.bag.get(name) {
            return Ok(value.clone());
        }
        self.transient
            .get(name)
            .cloned()
            .ok_or_else(|| DynError::LookupFailure(name.to_string()))
    }

    /// Schema attribute only.
    pub fn get_dynamic(&self, name: &str) -> Result<Value> {
        self.bag
            .get(name)
            .cloned()
            .ok_or_else(|| DynError::LookupFailure(name.to_string()))
    }

    /// Bag value, or `None` when the schema has no such field.
    pub fn extra_field_value(&self, name: &str) -> Option<&Value> {
        self.bag.get(name)
    }

    pub fn transient(&self, name: &str) -> Option<&Value> {
        self.transient.get(name)
    }

    /// Assign by name: declared base attributes first, then current schema
    /// fields. Any other name is kept as transient state and not saved.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<Assignment> {
        let value = value.into();
        if T::is_declared(name) {
            self.base.set_attribute(name, value)?;
            return Ok(Assignment::Base);
        }
        if self.schema.has_field(name) {
            self.bag.insert(name, value);
            return Ok(Assignment::Bag);
        }
        self.transient.insert(name.to_string(), value);
        Ok(Assignment::Transient)
    }

    /// Assign a schema attribute; names outside the schema are rejected.
    pub fn set_dynamic(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.schema.has_field(name) {
            return Err(DynError::LookupFailure(name.to_string()));
        }
        self.bag.insert(name, value.into());
        Ok(())
    }

    /// `(name, label, field_type, required)` for each schema field.
    pub fn extra_fields(&self) -> impl Iterator<Item = (&str, Option<&str>, FieldType, bool)> {
        self.schema
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.label.as_deref(), f.field_type, f.required))
    }

    pub fn extra_field_names(&self) -> Vec<&str> {
        self.schema.field_names().collect()
    }

    /// Schema attributes merged with declared base attributes (base wins).
    pub fn field_dict(&self) -> BTreeMap<String, Value> {
        let mut dict: BTreeMap<String, Value> = self
            .bag
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for name in T::declared_attributes() {
            if let Some(value) = self.base.attribute(name) {
                dict.insert(name.to_string(), value);
            }
        }
        dict
    }

    pub(crate) fn bag_mut(&mut self) -> &mut AttributeBag {
        &mut self.bag
    }

    pub fn to_row(&self) -> Result<RecordRow> {
        Ok(RecordRow {
            base: serde_json::to_value(&self.base)?,
            extra_fields: self.bag.encode()?,
        })
    }
}

fn discriminator_of<T: BaseRecord>(base: &T) -> String {
    match T::schema_type_descriptor().and_then(|attr| base.attribute(attr)) {
        None | Some(Value::Null) => String::new(),
        Some(Value::Text(text)) => text,
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::schema::FieldSpec;
    use crate::storage::{InMemoryStore, SchemaStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Note {
        kind: String,
        title: String,
    }

    impl BaseRecord for Note {
        fn base_type() -> &'static str {
            "tests::Note"
        }

        fn declared_attributes() -> &'static [&'static str] {
            &["kind", "title"]
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            match name {
                "kind" => Some(self.kind.clone().into()),
                "title" => Some(self.title.clone().into()),
                _ => None,
            }
        }

        fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
            let text = value.as_str().unwrap_or_default().to_string();
            match name {
                "kind" => self.kind = text,
                "title" => self.title = text,
                other => return Err(DynError::LookupFailure(other.to_string())),
            }
            Ok(())
        }

        fn schema_type_descriptor() -> Option<&'static str> {
            Some("kind")
        }
    }

    async fn cache_with_field(kind: &str, field: &str) -> SchemaCache {
        let store = Arc::new(InMemoryStore::new());
        let key = SchemaKey::new(Note::base_type(), kind);
        let (row, _) = store.get_or_create_schema(&key).await.unwrap();
        store
            .create_field(row.id, FieldSpec::new(field, FieldType::Char))
            .await
            .unwrap();
        SchemaCache::from_config(store, &RegistryConfig::default()).unwrap()
    }

    fn note(kind: &str) -> Note {
        Note {
            kind: kind.into(),
            title: "t".into(),
        }
    }

    #[tokio::test]
    async fn test_new_record_has_null_for_every_field() {
        let cache = cache_with_field("memo", "author").await;
        let record = DynamicRecord::new(note("memo"), &cache).await.unwrap();

        assert_eq!(record.discriminator(), "memo");
        assert_eq!(record.get("author").unwrap(), Value::Null);
        assert_eq!(record.bag().keys().collect::<Vec<_>>(), vec!["author"]);
    }

    #[tokio::test]
    async fn test_set_routes_by_tier() {
        let cache = cache_with_field("memo", "author").await;
        let mut record = DynamicRecord::new(note("memo"), &cache).await.unwrap();

        assert_eq!(record.set("title", "new").unwrap(), Assignment::Base);
        assert_eq!(record.set("author", "ann").unwrap(), Assignment::Bag);
        assert_eq!(record.set("scratch", 1).unwrap(), Assignment::Transient);

        assert_eq!(record.base().title, "new");
        assert_eq!(record.extra_field_value("author"), Some(&Value::from("ann")));
        assert!(!record.bag().contains_key("scratch"));
        assert!(!record.bag().contains_key("title"));
        assert_eq!(record.get("scratch").unwrap(), Value::Integer(1));
        assert!(record.get_dynamic("scratch").is_err());
    }

    #[tokio::test]
    async fn test_unknown_attribute_is_lookup_failure() {
        let cache = cache_with_field("memo", "author").await;
        let mut record = DynamicRecord::new(note("other"), &cache).await.unwrap();

        assert!(matches!(record.get("author"), Err(DynError::LookupFailure(_))));
        assert!(record.extra_field_value("author").is_none());
        assert!(matches!(
            record.set_dynamic("author", "x"),
            Err(DynError::LookupFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_hydrate_reconciles_stale_bag() {
        let cache = cache_with_field("memo", "author").await;
        let row = RecordRow {
            base: serde_json::to_value(note("memo")).unwrap(),
            extra_fields: r#"{"author": "bo", "gone": 1}"#.to_string(),
        };

        let record = DynamicRecord::<Note>::hydrate(RecordId(1), row, &cache).await.unwrap();
        assert_eq!(record.id(), Some(RecordId(1)));
        assert_eq!(record.get("author").unwrap(), Value::from("bo"));
        assert!(record.get("gone").is_err());
    }

    #[tokio::test]
    async fn test_hydrate_rejects_malformed_bag() {
        let cache = cache_with_field("memo", "author").await;
        let row = RecordRow {
            base: serde_json::to_value(note("memo")).unwrap(),
            extra_fields: "a".to_string(),
        };

        let result = DynamicRecord::<Note>::hydrate(RecordId(1), row, &cache).await;
        assert!(matches!(result, Err(DynError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_field_dict_merges_base_and_bag() {
        let cache = cache_with_field("memo", "author").await;
        let mut record = DynamicRecord::new(note("memo"), &cache).await.unwrap();
        record.set("author", "ann").unwrap();

        let dict = record.field_dict();
        assert_eq!(dict.get("author"), Some(&Value::from("ann")));
        assert_eq!(dict.get("kind"), Some(&Value::from("memo")));
        assert_eq!(dict.len(), 3);
    }
}
