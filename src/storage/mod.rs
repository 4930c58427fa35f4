pub mod engine;
pub mod memory;

pub use engine::{RecordId, RecordRow, RecordStore, SchemaStore};
pub use memory::{InMemoryStore, StoreStats};
