use super::field_type::FieldType;
use crate::core::{DynError, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

pub const MAX_NAME_LEN: usize = 100;

lazy_static! {
    static ref FIELD_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").expect("valid field name pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u64);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One dynamic attribute definition of a schema.
///
/// Only `label` and `extra` may change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub id: FieldId,
    pub schema_id: SchemaId,
    pub name: String,
    pub label: Option<String>,
    pub field_type: FieldType,
    pub required: bool,
    pub extra: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl SchemaField {
    /// Label shown to users: the stored label capitalized, or the name with
    /// underscores turned into spaces.
    pub fn display_label(&self) -> String {
        match self.label.as_deref().filter(|l| !l.is_empty()) {
            Some(label) => capitalize(label),
            None => capitalize(&self.name.replace('_', " ")),
        }
    }

    /// Choice list for dropdown fields, read from `extra.choices`.
    pub fn choices(&self) -> Vec<String> {
        self.extra
            .get("choices")
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        JsonValue::String(s) => Some(s.clone()),
                        // [value, label] pairs
                        JsonValue::Array(pair) => pair.first().and_then(JsonValue::as_str).map(String::from),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reject `next` if it differs from `self` (the persisted version) in
    /// anything other than label or extra.
    pub fn check_mutation(&self, next: &SchemaField) -> Result<()> {
        let immutable = |attribute: &str| DynError::ImmutableFieldError {
            field: self.name.clone(),
            attribute: attribute.to_string(),
        };

        if self.id != next.id {
            return Err(immutable("id"));
        }
        if self.schema_id != next.schema_id {
            return Err(immutable("schema"));
        }
        if self.name != next.name {
            return Err(immutable("name"));
        }
        if self.field_type != next.field_type {
            return Err(immutable("field_type"));
        }
        if self.required != next.required {
            return Err(immutable("required"));
        }
        if self.created_at != next.created_at {
            return Err(immutable("created_at"));
        }
        Ok(())
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        if let Some(label) = update.label {
            self.label = label;
        }
        if let Some(extra) = update.extra {
            self.extra = extra;
        }
    }
}

/// Input for creating a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub label: Option<String>,
    pub extra: JsonValue,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            label: None,
            extra: JsonValue::Object(Map::new()),
        }
    }

    /// Build from a field type token such as `"IntegerField"`.
    pub fn parse(name: impl Into<String>, field_type: &str) -> Result<Self> {
        Ok(Self::new(name, field_type.parse()?))
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn extra(mut self, extra: JsonValue) -> Self {
        self.extra = extra;
        self
    }

    pub fn choices<I, S>(self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices: Vec<JsonValue> = choices.into_iter().map(|c| JsonValue::String(c.into())).collect();
        self.extra(serde_json::json!({ "choices": choices }))
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if !self.extra.is_object() {
            return Err(DynError::ValidationError(format!(
                "extra of field '{}' must be an object",
                self.name
            )));
        }
        Ok(())
    }
}

/// The mutable part of a field.
///
/// `label: Some(None)` clears the label; `None` leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub label: Option<Option<String>>,
    pub extra: Option<JsonValue>,
}

impl FieldUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: Option<String>) -> Self {
        self.label = Some(label);
        self
    }

    pub fn extra(mut self, extra: JsonValue) -> Self {
        self.extra = Some(extra);
        self
    }
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(DynError::ValidationError(format!(
            "Name should be at most {} characters long.",
            MAX_NAME_LEN
        )));
    }
    if !FIELD_NAME_RE.is_match(name) {
        return Err(DynError::ValidationError(
            "Name should contain only alphanumeric characters and underscores.".to_string(),
        ));
    }
    Ok(())
}

fn capitalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, field_type: FieldType) -> SchemaField {
        SchemaField {
            id: FieldId(1),
            schema_id: SchemaId(1),
            name: name.to_string(),
            label: None,
            field_type,
            required: true,
            extra: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("severity").is_ok());
        assert!(validate_name("field_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name("dash-name").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_spec_parse_rejects_unknown_type() {
        assert!(FieldSpec::parse("severity", "IntegerField").is_ok());
        assert!(matches!(
            FieldSpec::parse("severity", "Integer"),
            Err(DynError::ValidationError(_))
        ));
    }

    #[test]
    fn test_spec_requires_object_extra() {
        let spec = FieldSpec::new("a", FieldType::Char).extra(serde_json::json!([1]));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_display_label() {
        let mut f = field("more_info", FieldType::Text);
        assert_eq!(f.display_label(), "More info");
        f.label = Some("extended INFO".into());
        assert_eq!(f.display_label(), "Extended info");
    }

    #[test]
    fn test_label_change_is_allowed() {
        let old = field("severity", FieldType::Integer);
        let mut next = old.clone();
        next.label = Some("Severity level".into());
        next.extra = serde_json::json!({"hint": "1-5"});
        assert!(old.check_mutation(&next).is_ok());
    }

    #[test]
    fn test_rename_and_retype_rejected() {
        let old = field("severity", FieldType::Integer);

        let mut renamed = old.clone();
        renamed.name = "level".into();
        renamed.label = Some("Level".into());
        let err = old.check_mutation(&renamed).unwrap_err();
        assert_eq!(err.attribute(), Some("name"));

        let mut retyped = old.clone();
        retyped.field_type = FieldType::Char;
        assert_eq!(old.check_mutation(&retyped).unwrap_err().attribute(), Some("field_type"));

        let mut optional = old.clone();
        optional.required = false;
        assert_eq!(old.check_mutation(&optional).unwrap_err().attribute(), Some("required"));
    }

    #[test]
    fn test_choices_from_extra() {
        let mut f = field("color", FieldType::Dropdown);
        f.extra = serde_json::json!({"choices": ["red", ["blue", "Blue"], 3]});
        assert_eq!(f.choices(), vec!["red".to_string(), "blue".to_string()]);
        assert!(field("x", FieldType::Char).choices().is_empty());
    }

    #[test]
    fn test_apply_update() {
        let mut f = field("a", FieldType::Char);
        f.label = Some("A".into());
        f.apply(FieldUpdate::new().extra(serde_json::json!({"k": 1})));
        assert_eq!(f.label.as_deref(), Some("A"));
        f.apply(FieldUpdate::new().label(None));
        assert_eq!(f.label, None);
        assert_eq!(f.extra, serde_json::json!({"k": 1}));
    }
}
