//! TableScan executor
//!
//! Reads the rows of a catalog table in insertion order.

use crate::catalog::Table;

use super::error::ExecutorResult;
use super::row::Row;
use super::Executor;

/// Table scan executor
pub struct TableScan<'a> {
    table: &'a Table,
    position: usize,
}

impl<'a> TableScan<'a> {
    pub fn new(table: &'a Table) -> Self {
        TableScan { table, position: 0 }
    }
}

impl Executor for TableScan<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.position = 0;
        tracing::trace!(table = %self.table.name(), rows = self.table.num_rows(), "Scanning table");
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        match self.table.row(self.position) {
            Some(values) => {
                self.position += 1;
                Ok(Some(Row::new(values)))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> ExecutorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DataType, Field, Value};
    use crate::executor::test_util::run;

    #[test]
    fn test_scan_in_insertion_order() {
        let mut catalog = Catalog::new();
        catalog
            .create_table("t", &[Field::new("x", DataType::Integer)])
            .unwrap();
        catalog
            .append_values("t", vec![vec![Value::Integer(2)], vec![Value::Integer(1)]])
            .unwrap();

        let mut scan = TableScan::new(catalog.get_table("t").unwrap());
        let rows = run(&mut scan).unwrap();
        assert_eq!(
            rows,
            vec![Row::new(vec![Value::Integer(2)]), Row::new(vec![Value::Integer(1)])]
        );
        // Reopening restarts the scan
        assert_eq!(run(&mut scan).unwrap().len(), 2);
    }
}
