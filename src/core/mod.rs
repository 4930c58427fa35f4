pub mod error;
pub mod value;

pub use error::{DynError, Result};
pub use value::Value;
