//! Crate-level error type

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::executor::ExecutorError;
use crate::sql::{ParseError, SqlError};

/// Any failure from loading tables or running a query
#[derive(Error, Debug)]
pub enum Error {
    /// Table lifecycle or row loading failed
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// Query text could not be tokenized or parsed
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Query did not resolve against the catalog
    #[error("{0}")]
    Sql(#[from] SqlError),

    /// Evaluation failed at runtime
    #[error("{0}")]
    Executor(#[from] ExecutorError),

    /// Reading schema or row files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;
