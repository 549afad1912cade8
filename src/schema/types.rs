// src/schema/types.rs

use serde::Deserialize;
use std::collections::BTreeMap;

pub type Year = u16;

/// Normalized table key, unique within one year's schema.
pub type TableId = String;

/// Column layout of one fixed-width table.
#[derive(Debug, Deserialize, PartialEq, Clone, Eq)]
pub struct TableSchema {
    pub widths: Vec<usize>,
    pub headers: Vec<String>,
}

impl TableSchema {
    pub fn new(widths: Vec<usize>, headers: Vec<String>) -> Result<Self, String> {
        let schema = Self { widths, headers };
        schema.check()?;
        Ok(schema)
    }

    /// Expected character count of every record.
    pub fn line_length(&self) -> usize {
        self.widths.iter().sum()
    }

    pub fn column_count(&self) -> usize {
        self.widths.len()
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        if self.widths.is_empty() {
            return Err("no columns declared".into());
        }
        if let Some(pos) = self.widths.iter().position(|w| *w == 0) {
            return Err(format!("width of column {} is zero", pos));
        }
        if self.widths.len() != self.headers.len() {
            return Err(format!(
                "{} widths but {} headers",
                self.widths.len(),
                self.headers.len()
            ));
        }
        Ok(())
    }
}

/// Where a year's archive lives on the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocator {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearSchema {
    pub locator: ArchiveLocator,
    pub tables: BTreeMap<TableId, TableSchema>,
}

impl YearSchema {
    pub fn table(&self, id: &str) -> Option<&TableSchema> {
        self.tables.get(id)
    }
}
