pub mod store;
pub mod types;

pub use store::{SchemaCache, SchemaDocument};
pub use types::{ArchiveLocator, TableId, TableSchema, Year, YearSchema};
