//! Query context for executors
//!
//! Holds the per-query state every operator needs: the catalog being read,
//! the pinned clock and RAND() stream, and resource bounds.

use crate::catalog::Catalog;
use crate::functions::FunctionContext;

/// Context passed to executors for one query
///
/// Contains:
/// - The catalog, for table scans and views
/// - The function context, so NOW() and RAND() are stable within the query
/// - The join size bound from the engine configuration
#[derive(Debug)]
pub struct QueryContext<'a> {
    pub catalog: &'a Catalog,
    pub functions: FunctionContext,
    pub max_intermediate_rows: Option<usize>,
}

impl<'a> QueryContext<'a> {
    /// Create the context for a query against `catalog`
    pub fn new(catalog: &'a Catalog) -> Self {
        let config = catalog.config();
        Self {
            catalog,
            functions: FunctionContext::new(config),
            max_intermediate_rows: config.max_intermediate_rows,
        }
    }
}
