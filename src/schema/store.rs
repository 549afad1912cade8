use once_cell::sync::OnceCell;
use serde_yaml::{Mapping, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use super::types::{ArchiveLocator, TableSchema, Year, YearSchema};
use crate::error::{IngestError, SchemaLoadError, SchemaProblem};
use crate::survey::Survey;

const KEY_BASE_URL: &str = "ftp_url";
const KEY_YEARS: &str = "anos";
const KEY_VERSION: &str = "version";
const KEY_FILENAME: &str = "filename";

/// One survey family's layouts, keyed by year. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub version: Option<String>,
    pub remote_base: String,
    pub valid_years: BTreeSet<Year>,
    years: BTreeMap<Year, YearSchema>,
}

impl SchemaDocument {
    /// Read and parse the document at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SchemaLoadError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| SchemaLoadError {
            origin: origin.clone(),
            problem: SchemaProblem::Io(e),
        })?;
        Self::from_yaml_str(&text, &origin)
    }

    /// Parse a YAML (or JSON) document; `origin` only labels errors.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, SchemaLoadError> {
        parse_document(text).map_err(|problem| SchemaLoadError {
            origin: origin.to_string(),
            problem,
        })
    }

    /// Replace the remote base address declared by the document.
    pub fn with_remote_base(mut self, base: impl Into<String>) -> Self {
        self.remote_base = base.into();
        self
    }

    /// Check `year` against the declared years and return its layouts.
    pub fn validate(&self, year: Year) -> Result<&YearSchema, IngestError> {
        self.years
            .get(&year)
            .filter(|_| self.valid_years.contains(&year))
            .ok_or_else(|| IngestError::InvalidYear {
                year,
                valid_years: self.valid_years.iter().copied().collect(),
            })
    }

    pub fn year(&self, year: Year) -> Option<&YearSchema> {
        self.years.get(&year)
    }
}

fn parse_document(text: &str) -> Result<SchemaDocument, SchemaProblem> {
    let root: Mapping = serde_yaml::from_str(text)?;

    let remote_base = match root.get(KEY_BASE_URL) {
        Some(Value::String(s)) => s.clone(),
        _ => return Err(SchemaProblem::MissingKey(KEY_BASE_URL.into())),
    };
    let valid_years: BTreeSet<Year> = match root.get(KEY_YEARS) {
        Some(v) => serde_yaml::from_value(v.clone())?,
        None => return Err(SchemaProblem::MissingKey(KEY_YEARS.into())),
    };
    let version = root.get(KEY_VERSION).and_then(scalar_string);

    let mut years = BTreeMap::new();
    for (key, value) in &root {
        let Some(year) = year_key(key) else {
            continue;
        };
        if !valid_years.contains(&year) {
            debug!(year, "ignoring section for undeclared year");
            continue;
        }
        years.insert(year, parse_year(year, value)?);
    }

    if let Some(missing) = valid_years.iter().find(|y| !years.contains_key(y)) {
        return Err(SchemaProblem::Year {
            year: *missing,
            reason: "declared in `anos` but has no section".into(),
        });
    }

    Ok(SchemaDocument {
        version,
        remote_base,
        valid_years,
        years,
    })
}

fn parse_year(year: Year, value: &Value) -> Result<YearSchema, SchemaProblem> {
    let section = value.as_mapping().ok_or_else(|| SchemaProblem::Year {
        year,
        reason: "section is not a mapping".into(),
    })?;

    let filename = section
        .get(KEY_FILENAME)
        .and_then(scalar_string)
        .ok_or_else(|| SchemaProblem::Year {
            year,
            reason: format!("missing `{}`", KEY_FILENAME),
        })?;

    let mut tables = BTreeMap::new();
    for (key, value) in section {
        let Some(table) = scalar_string(key) else {
            return Err(SchemaProblem::Year {
                year,
                reason: format!("unsupported table key {:?}", key),
            });
        };
        if table == KEY_FILENAME {
            continue;
        }
        let schema: TableSchema =
            serde_yaml::from_value(value.clone()).map_err(|e| SchemaProblem::Table {
                year,
                table: table.clone(),
                reason: e.to_string(),
            })?;
        schema.check().map_err(|reason| SchemaProblem::Table {
            year,
            table: table.clone(),
            reason,
        })?;
        tables.insert(table, schema);
    }

    Ok(YearSchema {
        locator: ArchiveLocator { filename },
        tables,
    })
}

/// Year sections may be written as `2015:` or `"2015":`.
fn year_key(key: &Value) -> Option<Year> {
    match key {
        Value::Number(n) => n.as_u64().and_then(|n| Year::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Per-family documents, each loaded from `dir` at most once.
pub struct SchemaCache {
    dir: PathBuf,
    base_url: Option<String>,
    pnad: OnceCell<Arc<SchemaDocument>>,
    pof: OnceCell<Arc<SchemaDocument>>,
}

impl SchemaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            base_url: None,
            pnad: OnceCell::new(),
            pof: OnceCell::new(),
        }
    }

    /// Override every loaded document's remote base.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn get(&self, survey: Survey) -> Result<Arc<SchemaDocument>, SchemaLoadError> {
        let cell = match survey {
            Survey::Pnad => &self.pnad,
            Survey::Pof => &self.pof,
        };
        cell.get_or_try_init(|| {
            let path = self.dir.join(survey.schema_file());
            let mut doc = SchemaDocument::load(&path)?;
            if let Some(base) = &self.base_url {
                doc = doc.with_remote_base(base.clone());
            }
            info!(
                survey = %survey,
                years = doc.valid_years.len(),
                version = doc.version.as_deref().unwrap_or("-"),
                "loaded schema document"
            );
            Ok(Arc::new(doc))
        })
        .cloned()
    }
}
