// src/error.rs

use thiserror::Error;
use zip::result::ZipError;

use crate::schema::Year;

/// Failures that abort a whole ingestion call.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    SchemaLoad(#[from] SchemaLoadError),

    #[error("invalid year {year}; available years: {valid_years:?}")]
    InvalidYear { year: Year, valid_years: Vec<Year> },

    #[error("cannot open archive {origin}")]
    ArchiveOpen {
        origin: String,
        #[source]
        cause: ArchiveOpenCause,
    },

    #[error("cannot fetch archive from {address}")]
    ArchiveFetch {
        address: String,
        #[source]
        cause: FetchError,
    },

    #[error("decode worker did not complete")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
#[error("cannot load schema document {origin}")]
pub struct SchemaLoadError {
    pub origin: String,
    #[source]
    pub problem: SchemaProblem,
}

#[derive(Debug, Error)]
pub enum SchemaProblem {
    #[error("unreadable")]
    Io(#[from] std::io::Error),
    #[error("malformed document")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required key `{0}`")]
    MissingKey(String),
    #[error("year {year}: {reason}")]
    Year { year: Year, reason: String },
    #[error("year {year}, table `{table}`: {reason}")]
    Table {
        year: Year,
        table: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveOpenCause {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] ZipError),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid address")]
    InvalidAddress(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("cancelled")]
    Cancelled,
}

/// A single archive entry that could not be turned into a table.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry `{entry_name}` resolves to table `{table_id}`, which the schema does not declare")]
    UnknownTable { entry_name: String, table_id: String },

    #[error("entry `{entry_name}` resolves to table `{table_id}`, already taken by an earlier entry")]
    DuplicateTable { entry_name: String, table_id: String },

    #[error("entry `{entry_name}` could not be read")]
    Unreadable {
        entry_name: String,
        #[source]
        cause: ArchiveOpenCause,
    },
}

impl EntryError {
    pub fn entry_name(&self) -> &str {
        match self {
            EntryError::UnknownTable { entry_name, .. }
            | EntryError::DuplicateTable { entry_name, .. }
            | EntryError::Unreadable { entry_name, .. } => entry_name,
        }
    }
}

/// A record whose length disagrees with the table's total width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: expected {expected_length} characters, found {actual_length}")]
pub struct LineDecodeError {
    /// 1-based.
    pub line_number: usize,
    pub expected_length: usize,
    pub actual_length: usize,
}
