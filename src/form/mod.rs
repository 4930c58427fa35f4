//! Forms over dynamic records.
//!
//! [`SchemaBoundForm`] edits the schema attributes of one record;
//! [`SchemaFieldForm`] edits a schema field definition itself.

pub mod field_form;
pub mod widgets;

pub use field_form::SchemaFieldForm;
pub use widgets::{Widget, WidgetTable};

use crate::core::{DynError, Result, Value};
use crate::record::{BaseRecord, DynamicRecord, RecordRepository};
use crate::schema::{FieldType, SchemaField};
use crate::storage::RecordId;
use lazy_static::lazy_static;
use regex::Regex;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Submitted form input, name → raw text.
pub type FormData = BTreeMap<String, String>;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid email pattern");
}

/// Build [`FormData`] from pairs.
pub fn form_data<I, K, V>(pairs: I) -> FormData
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Per-input validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, name: &str, message: impl Into<String>) {
        self.errors.entry(name.to_string()).or_default().push(message.into());
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(name, messages)| format!("{}: {}", name, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// One editable input generated from a schema field.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub widget: Widget,
    pub initial: Value,
    pub choices: Vec<String>,
}

impl FormField {
    fn from_schema(field: &SchemaField, widgets: &WidgetTable, initial: Value) -> Result<Self> {
        Ok(Self {
            name: field.name.clone(),
            label: field.display_label(),
            field_type: field.field_type,
            required: field.required,
            widget: widgets.lookup(field.field_type)?,
            initial,
            choices: field.choices(),
        })
    }

    /// Turn raw input into a typed value, or a user-facing message.
    pub fn clean(&self, raw: Option<&str>) -> std::result::Result<Value, String> {
        let raw = raw.map(str::trim).unwrap_or_default();

        if self.field_type == FieldType::Boolean {
            return self.clean_boolean(raw);
        }

        if raw.is_empty() {
            return if self.required {
                Err(REQUIRED_MESSAGE.to_string())
            } else {
                Ok(Value::Null)
            };
        }

        match self.field_type {
            FieldType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| "Enter a whole number.".to_string()),
            FieldType::Char | FieldType::Text => Ok(Value::Text(raw.to_string())),
            FieldType::Email => {
                if EMAIL_RE.is_match(raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err("Enter a valid email address.".to_string())
                }
            }
            FieldType::Dropdown => {
                if self.choices.iter().any(|choice| choice == raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err(format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        raw
                    ))
                }
            }
            FieldType::Boolean => self.clean_boolean(raw),
        }
    }

    fn clean_boolean(&self, raw: &str) -> std::result::Result<Value, String> {
        let checked = match raw.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => true,
            "" | "off" | "false" | "0" | "no" => false,
            _ => return Err("Enter a valid boolean.".to_string()),
        };
        if self.required && !checked {
            return Err(REQUIRED_MESSAGE.to_string());
        }
        Ok(Value::Boolean(checked))
    }
}

/// Form over the schema attributes of one dynamic record.
pub struct SchemaBoundForm<'a, T: BaseRecord> {
    record: &'a mut DynamicRecord<T>,
    fields: Vec<FormField>,
    errors: FormErrors,
    cleaned: BTreeMap<String, Value>,
    submitted: bool,
}

impl<'a, T: BaseRecord> SchemaBoundForm<'a, T> {
    pub fn new(record: &'a mut DynamicRecord<T>) -> Result<Self> {
        Self::with_widgets(record, &WidgetTable::standard())
    }

    pub fn with_widgets(record: &'a mut DynamicRecord<T>, widgets: &WidgetTable) -> Result<Self> {
        let fields = record
            .schema()
            .fields
            .iter()
            .map(|field| {
                let initial = record.extra_field_value(&field.name).cloned().unwrap_or(Value::Null);
                FormField::from_schema(field, widgets, initial)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            record,
            fields,
            errors: FormErrors::default(),
            cleaned: BTreeMap::new(),
            submitted: false,
        })
    }

    /// Bind to a type-erased instance, which must be a `DynamicRecord<T>`.
    pub fn bind(instance: &'a mut dyn Any) -> Result<Self> {
        match instance.downcast_mut::<DynamicRecord<T>>() {
            Some(record) => Self::new(record),
            None => Err(DynError::TypeMismatchError {
                expected: format!("DynamicRecord<{}>", T::base_type()),
                found: "an instance that is not a dynamic record".to_string(),
            }),
        }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn record(&self) -> &DynamicRecord<T> {
        &*self.record
    }

    /// Validate `data`. Only base form attributes and current schema fields
    /// are looked at; any other submitted key is ignored.
    pub fn submit(&mut self, data: &FormData) -> bool {
        self.errors.clear();
        self.cleaned.clear();
        self.submitted = true;

        for name in T::form_attributes() {
            if let Some(raw) = data.get(*name) {
                self.cleaned.insert(name.to_string(), Value::Text(raw.trim().to_string()));
            }
        }

        // self.fields mirrors the record's schema snapshot
        for field in &self.fields {
            match field.clean(data.get(&field.name).map(String::as_str)) {
                Ok(value) => {
                    self.cleaned.insert(field.name.clone(), value);
                }
                Err(message) => self.errors.add(&field.name, message),
            }
        }

        self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.submitted && self.errors.is_empty()
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn cleaned_data(&self) -> &BTreeMap<String, Value> {
        &self.cleaned
    }

    /// Write cleaned values into the record and persist it.
    pub async fn save(self, repository: &RecordRepository<T>) -> Result<RecordId> {
        if !self.submitted {
            return Err(DynError::ValidationError("form was not submitted".to_string()));
        }
        if !self.errors.is_empty() {
            return Err(DynError::ValidationError(self.errors.to_string()));
        }

        let Self { record, cleaned, .. } = self;
        for (name, value) in cleaned {
            if T::form_attributes().contains(&name.as_str()) {
                record.base_mut().set_attribute(&name, value)?;
            } else if record.schema().has_field(&name) {
                record.bag_mut().insert(name, value);
            }
        }

        repository.save(record).await
    }
}
