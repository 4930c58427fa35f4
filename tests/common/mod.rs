#![allow(dead_code)]

use dynmodel::{BaseRecord, DynError, InMemoryStore, RecordRepository, Result, SchemaRegistry, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ticket whose schema follows its `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub kind: String,
    pub title: String,
}

impl Ticket {
    pub fn new(kind: &str, title: &str) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
        }
    }
}

impl BaseRecord for Ticket {
    fn base_type() -> &'static str {
        "Ticket"
    }

    fn declared_attributes() -> &'static [&'static str] {
        &["kind", "title"]
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "kind" => Some(Value::from(self.kind.as_str())),
            "title" => Some(Value::from(self.title.as_str())),
            _ => None,
        }
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        let text = value.to_input_string();
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

    fn form_attributes() -> &'static [&'static str] {
        &["title"]
    }
}

/// Model without a type descriptor: one schema for every instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
}

impl BaseRecord for Contact {
    fn base_type() -> &'static str {
        "Contact"
    }

    fn declared_attributes() -> &'static [&'static str] {
        &["name"]
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        (name == "name").then(|| Value::from(self.name.as_str()))
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        if name != "name" {
            return Err(DynError::LookupFailure(name.to_string()));
        }
        self.name = value.to_input_string();
        Ok(())
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub registry: SchemaRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let registry = SchemaRegistry::new(store.clone()).unwrap();
        Self { store, registry }
    }

    pub fn with_registry(store: Arc<InMemoryStore>, registry: SchemaRegistry) -> Self {
        Self { store, registry }
    }

    pub fn repository<T: BaseRecord>(&self) -> RecordRepository<T> {
        RecordRepository::new(self.registry.cache().clone(), self.store.clone())
    }
}
