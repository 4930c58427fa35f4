use super::field::{SchemaField, SchemaId};
use super::key::SchemaKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored schema row without its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRow {
    pub id: SchemaId,
    pub key: SchemaKey,
}

/// Fully materialized schema: the row plus its fields in creation order.
///
/// This is the value held in the schema cache, so reading it never goes back
/// to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: SchemaId,
    pub key: SchemaKey,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn from_row(row: SchemaRow, fields: Vec<SchemaField>) -> Self {
        Self {
            id: row.id,
            key: row.key,
            fields,
        }
    }

    pub fn row(&self) -> SchemaRow {
        SchemaRow {
            id: self.id,
            key: self.key.clone(),
        }
    }

    pub fn base_type(&self) -> &str {
        &self.key.base_type
    }

    pub fn discriminator(&self) -> &str {
        &self.key.discriminator
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}
