//! The ingestion pipeline: validate the year, resolve the archive, split it
//! into table entries, decode each entry against its layout.

use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{info, instrument, warn};

use crate::error::{EntryError, IngestError, LineDecodeError};
use crate::fetch::{zips, Fetcher, HttpFetcher};
use crate::process::{
    archive::{self, ArchiveHandle},
    decode::{decode_bytes, DecodeOptions},
    split::split_archive,
    Dataset,
};
use crate::schema::{SchemaCache, SchemaDocument, TableId, Year, YearSchema};
use crate::survey::Survey;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub survey: Survey,
    pub year: Year,
    /// Read this archive instead of fetching it.
    pub local_path: Option<PathBuf>,
    pub options: DecodeOptions,
}

impl IngestRequest {
    pub fn new(survey: Survey, year: Year) -> Self {
        Self {
            survey,
            year,
            local_path: None,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }
}

/// Everything one ingestion call produced: the decoded tables and every
/// per-entry and per-line failure met along the way.
#[derive(Debug)]
pub struct IngestionReport {
    pub survey: Survey,
    pub requested_year: Year,
    /// The year whose layouts were used, after aliasing.
    pub year: Year,
    pub tables: BTreeMap<TableId, Dataset>,
    pub line_errors: BTreeMap<TableId, Vec<LineDecodeError>>,
    pub entry_failures: Vec<EntryError>,
    /// Tables the schema declares but the archive did not provide.
    pub missing_tables: Vec<TableId>,
}

impl IngestionReport {
    pub fn table(&self, id: &str) -> Option<&Dataset> {
        self.tables.get(id)
    }

    pub fn line_error_count(&self) -> usize {
        self.line_errors.values().map(Vec::len).sum()
    }

    /// True when every declared table was decoded without a single failure.
    pub fn is_complete(&self) -> bool {
        self.entry_failures.is_empty()
            && self.missing_tables.is_empty()
            && self.line_error_count() == 0
    }
}

/// Run one synchronous ingestion against an already loaded document.
#[instrument(level = "info", skip(doc, fetcher, request), fields(survey = %request.survey, year = request.year))]
pub fn ingest(
    doc: &SchemaDocument,
    fetcher: &dyn Fetcher,
    request: &IngestRequest,
) -> Result<IngestionReport, IngestError> {
    let year = request.survey.normalize_year(request.year);
    let year_schema = doc.validate(year)?;
    let address = request
        .survey
        .remote_address(&doc.remote_base, year, &year_schema.locator);
    let handle = archive::resolve(request.local_path.as_deref(), &address, fetcher)?;
    Ok(process_archive(request, year, year_schema, handle))
}

/// Async ingestion: the remote download races `cancel`, decoding runs on
/// the blocking pool. `cancel` is ignored for local archives.
pub async fn ingest_async<C>(
    doc: Arc<SchemaDocument>,
    client: &reqwest::Client,
    request: IngestRequest,
    cancel: C,
) -> Result<IngestionReport, IngestError>
where
    C: Future<Output = ()>,
{
    let year = request.survey.normalize_year(request.year);
    let year_schema = doc.validate(year)?;

    let handle = match &request.local_path {
        Some(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || ArchiveHandle::open_path(path)).await??
        }
        None => {
            let address =
                request
                    .survey
                    .remote_address(&doc.remote_base, year, &year_schema.locator);
            info!(%address, "retrieving archive from remote source");
            let bytes = zips::fetch_zip_cancellable(client, &address, cancel)
                .await
                .map_err(|cause| IngestError::ArchiveFetch {
                    address: address.clone(),
                    cause,
                })?;
            ArchiveHandle::from_bytes(address, bytes)?
        }
    };

    tokio::task::spawn_blocking(move || {
        let year_schema = doc.validate(year)?;
        Ok::<_, IngestError>(process_archive(&request, year, year_schema, handle))
    })
    .await?
}

fn process_archive(
    request: &IngestRequest,
    year: Year,
    year_schema: &YearSchema,
    handle: ArchiveHandle,
) -> IngestionReport {
    let start = Instant::now();
    let split = split_archive(handle, year_schema, request.survey.entry_naming());
    let options = request.options;

    let decoded: Vec<_> = split
        .entries
        .into_par_iter()
        .filter_map(|entry| {
            let schema = year_schema.table(&entry.table_id)?;
            let out = decode_bytes(&entry.data, schema, options);
            if out.errors.is_empty() {
                info!(table = %entry.table_id, rows = out.dataset.len(), "processed table");
            } else {
                warn!(
                    table = %entry.table_id,
                    rows = out.dataset.len(),
                    bad_lines = out.errors.len(),
                    first_bad_line = out.errors[0].line_number,
                    "processed table with malformed lines"
                );
            }
            Some((entry.table_id, out))
        })
        .collect();

    let mut tables = BTreeMap::new();
    let mut line_errors = BTreeMap::new();
    for (table_id, out) in decoded {
        if !out.errors.is_empty() {
            line_errors.insert(table_id.clone(), out.errors);
        }
        tables.insert(table_id, out.dataset);
    }

    let missing_tables: Vec<TableId> = year_schema
        .tables
        .keys()
        .filter(|id| !tables.contains_key(*id))
        .cloned()
        .collect();
    if !missing_tables.is_empty() {
        warn!(tables = ?missing_tables, "declared tables absent from archive");
    }

    info!(
        tables = tables.len(),
        entry_failures = split.failures.len(),
        elapsed = ?start.elapsed(),
        "ingestion complete"
    );

    IngestionReport {
        survey: request.survey,
        requested_year: request.year,
        year,
        tables,
        line_errors,
        entry_failures: split.failures,
        missing_tables,
    }
}

/// Loads schema documents on first use and ingests through one fetcher.
pub struct Ingestor<F = HttpFetcher> {
    schemas: SchemaCache,
    fetcher: F,
}

impl<F: Fetcher> Ingestor<F> {
    pub fn new(schemas: SchemaCache, fetcher: F) -> Self {
        Self { schemas, fetcher }
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    pub fn ingest(
        &self,
        survey: Survey,
        year: Year,
        local_path: Option<&Path>,
        emit_headers: bool,
    ) -> Result<IngestionReport, IngestError> {
        let doc = self.schemas.get(survey)?;
        let mut request = IngestRequest::new(survey, year).with_options(DecodeOptions {
            emit_headers,
            ..DecodeOptions::default()
        });
        request.local_path = local_path.map(Path::to_path_buf);
        ingest(&doc, &self.fetcher, &request)
    }
}
