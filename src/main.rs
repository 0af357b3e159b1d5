//! bqlite command-line query runner
//!
//! Usage: bqlite --table NAME=SCHEMA_JSON[:ROWS_NDJSON] ... [--format table|json] QUERY
//!
//! Exit codes:
//!   0 - Success
//!   1 - Query failed to parse, resolve or evaluate
//!   2 - A table could not be created or loaded

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use bqlite::catalog::{schema_from_json, Catalog};
use bqlite::EngineConfig;

/// A table to create before running the query
#[derive(Debug, Clone)]
struct TableSpec {
    name: String,
    schema: PathBuf,
    rows: Option<PathBuf>,
}

fn parse_table_spec(raw: &str) -> Result<TableSpec, String> {
    let (name, paths) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SCHEMA[:ROWS], got '{}'", raw))?;
    if name.is_empty() {
        return Err("table name is empty".to_string());
    }
    let (schema, rows) = match paths.split_once(':') {
        Some((schema, rows)) => (schema, Some(PathBuf::from(rows))),
        None => (paths, None),
    };
    Ok(TableSpec {
        name: name.to_string(),
        schema: PathBuf::from(schema),
        rows,
    })
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a BigQuery-dialect query against local JSON tables")]
struct Cli {
    /// Table definition: NAME=SCHEMA_JSON[:ROWS_NDJSON]
    #[arg(long = "table", value_parser = parse_table_spec)]
    tables: Vec<TableSpec>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", env = "BQLITE_FORMAT")]
    format: OutputFormat,

    /// Query text
    query: String,
}

fn load_table(catalog: &mut Catalog, spec: &TableSpec) -> bqlite::Result<usize> {
    let fields = schema_from_json(&fs::read_to_string(&spec.schema)?)?;
    catalog.create_table(spec.name.clone(), &fields)?;
    match &spec.rows {
        Some(path) => Ok(catalog.load_ndjson(&spec.name, &fs::read_to_string(path)?)?),
        None => Ok(0),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut catalog = Catalog::with_config(EngineConfig::from_env());

    for spec in &cli.tables {
        match load_table(&mut catalog, spec) {
            Ok(rows) => tracing::debug!(table = %spec.name, rows, "Table ready"),
            Err(e) => {
                eprintln!("ERROR: loading table '{}': {}", spec.name, e);
                return ExitCode::from(2);
            }
        }
    }

    let result = match bqlite::run_query(&cli.query, &catalog) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(1);
        }
    };

    match cli.format {
        OutputFormat::Table => print!("{}", result),
        OutputFormat::Json => {
            for row in result.to_json_rows() {
                println!("{}", row);
            }
        }
    }
    ExitCode::SUCCESS
}
