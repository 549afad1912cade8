//! Reads fixed-width survey microdata tables out of published ZIP archives,
//! using a per-year layout document to slice every record into columns.

pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod process;
pub mod schema;
pub mod survey;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::{EntryError, IngestError, LineDecodeError, SchemaLoadError};
pub use ingest::{ingest, ingest_async, IngestRequest, IngestionReport, Ingestor};
pub use process::{Columns, Dataset, DecodeOptions, TextEncoding, TrimPolicy};
pub use schema::{SchemaCache, SchemaDocument, TableSchema, Year};
pub use survey::Survey;
