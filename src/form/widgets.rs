use crate::core::{DynError, Result};
use crate::schema::FieldType;

/// Presentation widget for a form input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    NumberInput,
    TextInput,
    Textarea,
    EmailInput,
    Checkbox,
    Select,
}

/// Field type → widget lookup used when building a bound form.
#[derive(Debug, Clone)]
pub struct WidgetTable {
    entries: Vec<(FieldType, Widget)>,
}

impl WidgetTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Widgets for every built-in field type.
    pub fn standard() -> Self {
        Self::empty()
            .with(FieldType::Integer, Widget::NumberInput)
            .with(FieldType::Char, Widget::TextInput)
            .with(FieldType::Text, Widget::Textarea)
            .with(FieldType::Email, Widget::EmailInput)
            .with(FieldType::Boolean, Widget::Checkbox)
            .with(FieldType::Dropdown, Widget::Select)
    }

    /// Register or replace the widget for `field_type`.
    pub fn with(mut self, field_type: FieldType, widget: Widget) -> Self {
        self.entries.retain(|(ft, _)| *ft != field_type);
        self.entries.push((field_type, widget));
        self
    }

    pub fn lookup(&self, field_type: FieldType) -> Result<Widget> {
        self.entries
            .iter()
            .find(|(ft, _)| *ft == field_type)
            .map(|(_, widget)| *widget)
            .ok_or_else(|| DynError::UnknownWidget(field_type.token().to_string()))
    }
}

impl Default for WidgetTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_covers_all_types() {
        let table = WidgetTable::standard();
        for field_type in FieldType::ALL {
            assert!(table.lookup(field_type).is_ok());
        }
        assert_eq!(table.lookup(FieldType::Text).unwrap(), Widget::Textarea);
    }

    #[test]
    fn test_missing_type_is_unknown_widget() {
        let table = WidgetTable::empty().with(FieldType::Char, Widget::TextInput);
        assert!(matches!(
            table.lookup(FieldType::Email),
            Err(DynError::UnknownWidget(t)) if t == "EmailField"
        ));
    }

    #[test]
    fn test_with_replaces_entry() {
        let table = WidgetTable::standard().with(FieldType::Text, Widget::TextInput);
        assert_eq!(table.lookup(FieldType::Text).unwrap(), Widget::TextInput);
    }
}
