pub mod field;
pub mod field_type;
pub mod key;
pub mod model;

pub use field::{FieldId, FieldSpec, FieldUpdate, SchemaField, SchemaId, validate_name};
pub use field_type::FieldType;
pub use key::SchemaKey;
pub use model::{Schema, SchemaRow};
