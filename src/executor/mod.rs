//! Query executor - Volcano iterator model
//!
//! The engine turns a resolved SELECT into a tree of operators and pulls
//! rows through it. Each operator implements open/next/close.
//!
//! Rows flowing out of the FROM pipeline are the concatenation of the FROM
//! sources' columns. Projection (or grouping) reshapes them into the select
//! list followed by any ORDER BY keys, which the sort strips again.

pub mod aggregate;
pub mod context;
pub mod distinct;
pub mod engine;
pub mod error;
pub mod eval;
pub mod filter;
pub mod join;
pub mod limit;
pub mod project;
pub mod result;
pub mod row;
pub mod scan;
pub mod single_row;
pub mod sort;

pub use context::QueryContext;
pub use engine::execute;
pub use error::{ExecutorError, ExecutorResult};
pub use result::ResultTable;
pub use row::Row;

/// Volcano-style iterator executor
///
/// Each operator implements:
/// - `open()`: Initialize the operator
/// - `next()`: Return the next row, or None if exhausted
/// - `close()`: Clean up resources
pub trait Executor {
    /// Initialize the executor
    fn open(&mut self) -> ExecutorResult<()>;

    /// Get the next row, or None if exhausted
    fn next(&mut self) -> ExecutorResult<Option<Row>>;

    /// Close the executor and release resources
    fn close(&mut self) -> ExecutorResult<()>;
}

/// Boxed operator borrowing from the catalog and query context
pub type BoxedExecutor<'a> = Box<dyn Executor + 'a>;

/// Drain an opened executor into a vector
pub fn collect_rows<E: Executor + ?Sized>(executor: &mut E) -> ExecutorResult<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = executor.next()? {
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// Executor over a fixed list of rows
    pub struct MockExecutor {
        rows: Vec<Row>,
        position: usize,
    }

    impl MockExecutor {
        pub fn new(rows: Vec<Row>) -> Self {
            MockExecutor { rows, position: 0 }
        }

        pub fn boxed<'a>(rows: Vec<Row>) -> BoxedExecutor<'a> {
            Box::new(Self::new(rows))
        }
    }

    impl Executor for MockExecutor {
        fn open(&mut self) -> ExecutorResult<()> {
            self.position = 0;
            Ok(())
        }

        fn next(&mut self) -> ExecutorResult<Option<Row>> {
            if self.position < self.rows.len() {
                let row = self.rows[self.position].clone();
                self.position += 1;
                Ok(Some(row))
            } else {
                Ok(None)
            }
        }

        fn close(&mut self) -> ExecutorResult<()> {
            Ok(())
        }
    }

    /// Open, drain and close an executor
    pub fn run<E: Executor + ?Sized>(executor: &mut E) -> ExecutorResult<Vec<Row>> {
        executor.open()?;
        let rows = collect_rows(executor)?;
        executor.close()?;
        Ok(rows)
    }
}
