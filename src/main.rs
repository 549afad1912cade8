use anyhow::{Context, Result};
use clap::Parser;
use microdata::{
    ingest_async, Config, DecodeOptions, IngestRequest, IngestionReport, Survey, TrimPolicy, Year,
};
use reqwest::Client;
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Decode IBGE PNAD / POF fixed-width microdata from a ZIP archive"
)]
struct Args {
    /// Survey family: pnad or pof
    survey: Survey,
    year: Year,
    /// Read this local archive instead of downloading it
    #[arg(long)]
    path: Option<PathBuf>,
    /// Address columns by position rather than by header
    #[arg(long)]
    no_headers: bool,
    /// Strip surrounding whitespace from every cell
    #[arg(long)]
    trim: bool,
    /// Print the first N rows of each table
    #[arg(long, default_value_t = 0)]
    preview: usize,
    /// Print a JSON summary instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            emit_headers: !self.no_headers,
            trim: if self.trim {
                TrimPolicy::Edges
            } else {
                TrimPolicy::Raw
            },
            ..DecodeOptions::default()
        }
    }
}

#[derive(Serialize)]
struct TableSummary {
    rows: usize,
    columns: usize,
    bad_lines: usize,
}

#[derive(Serialize)]
struct Summary {
    survey: String,
    requested_year: Year,
    year: Year,
    tables: BTreeMap<String, TableSummary>,
    entry_failures: Vec<String>,
    missing_tables: Vec<String>,
}

impl From<&IngestionReport> for Summary {
    fn from(r: &IngestionReport) -> Self {
        Summary {
            survey: r.survey.to_string(),
            requested_year: r.requested_year,
            year: r.year,
            tables: r
                .tables
                .iter()
                .map(|(id, ds)| {
                    let bad_lines = r.line_errors.get(id).map_or(0, Vec::len);
                    (
                        id.clone(),
                        TableSummary {
                            rows: ds.len(),
                            columns: ds.width(),
                            bad_lines,
                        },
                    )
                })
                .collect(),
            entry_failures: r.entry_failures.iter().map(|e| e.to_string()).collect(),
            missing_tables: r.missing_tables.clone(),
        }
    }
}

fn print_report(report: &IngestionReport, preview: usize) {
    println!(
        "{} {} (requested {}): {} tables",
        report.survey,
        report.year,
        report.requested_year,
        report.tables.len()
    );
    for (id, ds) in &report.tables {
        println!("  {:<24} {:>10} rows {:>5} columns", id, ds.len(), ds.width());
        for i in 0..preview.min(ds.len()) {
            match ds.labeled_row(i) {
                Some(pairs) => {
                    let cells: Vec<String> =
                        pairs.iter().map(|(h, v)| format!("{}={:?}", h, v)).collect();
                    println!("    {}", cells.join(" "));
                }
                None => println!("    {:?}", ds.row(i).unwrap_or_default()),
            }
        }
        if let Some(errors) = report.line_errors.get(id) {
            for e in errors {
                println!("    ! {}", e);
            }
        }
    }
    for f in &report.entry_failures {
        println!("  ! {}", f);
    }
    for id in &report.missing_tables {
        println!("  ! table {} declared but not in archive", id);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) arguments & configuration ────────────────────────────────
    let args = Args::parse();
    let config = Config::from_env();
    info!(schema_dir = %config.schema_dir.display(), "startup");

    let doc = config
        .schema_cache()
        .get(args.survey)
        .with_context(|| format!("loading {} schema", args.survey))?;

    // ─── 3) ingest, Ctrl-C abandons a running download ───────────────
    let mut request = IngestRequest::new(args.survey, args.year).with_options(args.decode_options());
    request.local_path = args.path.clone();

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let client = Client::new();
    let report = ingest_async(doc, &client, request, cancel)
        .await
        .with_context(|| format!("ingesting {} {}", args.survey, args.year))?;

    // ─── 4) report ───────────────────────────────────────────────────
    if args.json {
        println!("{}", serde_json::to_string_pretty(&Summary::from(&report))?);
    } else {
        print_report(&report, args.preview);
    }

    info!(complete = report.is_complete(), "all done");
    Ok(())
}
