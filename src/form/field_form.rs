use super::{FormData, FormErrors, REQUIRED_MESSAGE};
use crate::core::{DynError, Result};
use crate::registry::SchemaRegistry;
use crate::schema::{FieldSpec, FieldType, Schema, SchemaField, validate_name};
use serde_json::json;
use std::sync::Arc;

/// Errors not tied to one input.
pub const NON_FIELD_ERRORS: &str = "__all__";

enum Target {
    Create { schema: Arc<Schema>, field_type: FieldType },
    Edit { field: SchemaField },
}

#[derive(Debug, Clone)]
struct Cleaned {
    name: String,
    label: Option<String>,
    required: bool,
    choices: Option<Vec<String>>,
}

/// Admin-side editor for one schema field.
///
/// Immutability and validation failures raised by the registry come back as
/// errors on the offending input, never as a failed call.
pub struct SchemaFieldForm {
    target: Target,
    errors: FormErrors,
    cleaned: Option<Cleaned>,
}

impl SchemaFieldForm {
    /// Form adding a new field of `field_type` to `schema`.
    pub fn create(schema: Arc<Schema>, field_type: FieldType) -> Self {
        Self {
            target: Target::Create { schema, field_type },
            errors: FormErrors::default(),
            cleaned: None,
        }
    }

    /// Form editing an existing field.
    pub fn edit(field: SchemaField) -> Self {
        Self {
            target: Target::Edit { field },
            errors: FormErrors::default(),
            cleaned: None,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match &self.target {
            Target::Create { field_type, .. } => *field_type,
            Target::Edit { field } => field.field_type,
        }
    }

    pub fn title(&self) -> String {
        match &self.target {
            Target::Create { field_type, .. } => format!("Add new field - {}", field_type.description()),
            Target::Edit { field } => format!("Edit field - {}", field.name),
        }
    }

    /// Names of the inputs this form accepts.
    pub fn input_names(&self) -> Vec<&'static str> {
        let mut names = vec!["name", "label"];
        match self.field_type() {
            FieldType::Boolean => {}
            FieldType::Dropdown => names.extend(["required", "options"]),
            _ => names.push("required"),
        }
        names
    }

    /// Prefilled input text when editing.
    pub fn initial(&self, input: &str) -> Option<String> {
        let Target::Edit { field } = &self.target else {
            return None;
        };
        match input {
            "name" => Some(field.name.clone()),
            "label" => field.label.clone(),
            "required" => Some(field.required.to_string()),
            "options" if field.field_type == FieldType::Dropdown => Some(field.choices().join(",")),
            _ => None,
        }
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.cleaned.is_some() && self.errors.is_empty()
    }

    pub fn submit(&mut self, data: &FormData) -> bool {
        self.errors.clear();
        self.cleaned = None;

        let name = data.get("name").map(|n| n.trim()).unwrap_or_default();
        if name.is_empty() {
            self.errors.add("name", REQUIRED_MESSAGE);
        } else if let Err(DynError::ValidationError(message)) = validate_name(name) {
            self.errors.add("name", message);
        }

        let label = data
            .get("label")
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(String::from);

        let required = match self.field_type() {
            FieldType::Boolean => match &self.target {
                Target::Edit { field } => field.required,
                Target::Create { .. } => false,
            },
            _ => is_checked(data.get("required").map(String::as_str)),
        };

        let choices = if self.field_type() == FieldType::Dropdown {
            let options: Vec<String> = data
                .get("options")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|option| !option.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            if options.is_empty() {
                self.errors.add("options", REQUIRED_MESSAGE);
            }
            Some(options)
        } else {
            None
        };

        if !self.errors.is_empty() {
            return false;
        }

        self.cleaned = Some(Cleaned {
            name: name.to_string(),
            label,
            required,
            choices,
        });
        true
    }

    /// Persist through `registry`.
    ///
    /// Returns `Ok(None)` when the form is invalid or the registry rejected
    /// the change with a field-level error; `errors()` then says why.
    pub async fn save(&mut self, registry: &SchemaRegistry) -> Result<Option<SchemaField>> {
        let Some(cleaned) = self.cleaned.clone() else {
            if self.errors.is_empty() {
                self.errors.add(NON_FIELD_ERRORS, "Form was not submitted.");
            }
            return Ok(None);
        };

        let outcome = match &self.target {
            Target::Create { schema, field_type } => {
                let mut spec = FieldSpec::new(cleaned.name, *field_type).required(cleaned.required);
                if let Some(label) = cleaned.label {
                    spec = spec.label(label);
                }
                if let Some(choices) = cleaned.choices {
                    spec = spec.choices(choices);
                }
                registry.create_field(schema, spec).await
            }
            Target::Edit { field } => {
                let mut next = field.clone();
                next.name = cleaned.name;
                next.label = cleaned.label;
                next.required = cleaned.required;
                if let Some(choices) = cleaned.choices {
                    match next.extra.as_object_mut() {
                        Some(extra) => {
                            extra.insert("choices".to_string(), json!(choices));
                        }
                        None => next.extra = json!({ "choices": choices }),
                    }
                }
                registry.save_field(next).await
            }
        };

        match outcome {
            Ok(field) => {
                if let Target::Edit { field: current } = &mut self.target {
                    *current = field.clone();
                }
                Ok(Some(field))
            }
            Err(err) if err.is_field_error() => {
                let input = match &err {
                    DynError::ImmutableFieldError { attribute, .. } => attribute.clone(),
                    DynError::ConstraintViolation(_) => "name".to_string(),
                    _ => NON_FIELD_ERRORS.to_string(),
                };
                self.errors.add(&input, err.to_string());
                self.cleaned = None;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn is_checked(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|r| r.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}
