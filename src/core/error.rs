use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Field '{field}': '{attribute}' value cannot be modified")]
    ImmutableFieldError { field: String, attribute: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatchError { expected: String, found: String },

    #[error("Attribute '{0}' does not exist")]
    LookupFailure(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("No widget registered for field type '{0}'")]
    UnknownWidget(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, DynError>;

impl DynError {
    /// Errors that a form reports against one of its inputs instead of failing the save.
    pub fn is_field_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::ImmutableFieldError { .. } | Self::ConstraintViolation(_)
        )
    }

    /// The field attribute an error is about, when it names one.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::ImmutableFieldError { attribute, .. } => Some(attribute),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DynError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DynError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_error_names_attribute() {
        let err = DynError::ImmutableFieldError {
            field: "severity".into(),
            attribute: "field_type".into(),
        };
        assert_eq!(err.attribute(), Some("field_type"));
        assert!(err.is_field_error());
        assert_eq!(err.to_string(), "Field 'severity': 'field_type' value cannot be modified");
    }

    #[test]
    fn test_lookup_failure_is_not_field_error() {
        assert!(!DynError::LookupFailure("x".into()).is_field_error());
        assert!(!DynError::NotFound("Schema".into()).is_field_error());
    }

    #[test]
    fn test_serde_error_maps_to_decode() {
        let err: DynError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, DynError::DecodeError(_)));
    }
}
