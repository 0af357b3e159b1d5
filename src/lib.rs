//! bqlite - an in-memory BigQuery-dialect SQL engine
//!
//! Features:
//! - Legacy BigQuery SQL: joins, GROUP BY/HAVING, ORDER BY, LIMIT, DISTINCT
//! - BigQuery-style schemas with REQUIRED/NULLABLE/REPEATED modes and RECORDs
//! - Deterministic clock and RAND() for reproducible tests
//!
//! ```no_run
//! use bqlite::catalog::{Catalog, DataType, Field};
//!
//! let mut catalog = Catalog::new();
//! catalog.create_table("t", &[Field::new("x", DataType::Integer)])?;
//! catalog.load_ndjson("t", "{\"x\": 1}\n{\"x\": 2}")?;
//! let result = bqlite::run_query("SELECT SUM(x) AS total FROM t", &catalog)?;
//! println!("{}", result);
//! # Ok::<(), bqlite::Error>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod functions;
pub mod sql;

pub use catalog::{Catalog, SharedCatalog};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use executor::ResultTable;

/// Parse, resolve and evaluate one query against `catalog`
pub fn run_query(sql: &str, catalog: &Catalog) -> Result<ResultTable> {
    tracing::debug!(query = %sql, "Running query");
    let statement = sql::parse(sql)?;
    let select = sql::Resolver::new(catalog).resolve_select(&statement)?;
    Ok(executor::execute(&select, catalog)?)
}
