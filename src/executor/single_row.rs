//! Single row executor
//!
//! Source for a select without FROM: one row with no columns, so constant
//! expressions are evaluated exactly once.

use super::error::ExecutorResult;
use super::row::Row;
use super::Executor;

/// Executor that yields exactly one empty row
#[derive(Debug, Default)]
pub struct SingleRow {
    returned: bool,
}

impl SingleRow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for SingleRow {
    fn open(&mut self) -> ExecutorResult<()> {
        self.returned = false;
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if self.returned {
            Ok(None)
        } else {
            self.returned = true;
            Ok(Some(Row::empty()))
        }
    }

    fn close(&mut self) -> ExecutorResult<()> {
        Ok(())
    }
}
