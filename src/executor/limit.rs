//! Limit executor
//!
//! Implements LIMIT and OFFSET for query results.

use super::error::ExecutorResult;
use super::row::Row;
use super::{BoxedExecutor, Executor};

/// Limit executor
pub struct Limit<'a> {
    input: BoxedExecutor<'a>,
    /// Maximum rows to return (None = unlimited)
    limit: Option<u64>,
    /// Rows to skip
    offset: u64,
    skipped: u64,
    returned: u64,
}

impl<'a> Limit<'a> {
    pub fn new(input: BoxedExecutor<'a>, limit: Option<u64>, offset: Option<u64>) -> Self {
        Limit {
            input,
            limit,
            offset: offset.unwrap_or(0),
            skipped: 0,
            returned: 0,
        }
    }
}

impl Executor for Limit<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.skipped = 0;
        self.returned = 0;
        self.input.open()
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if let Some(limit) = self.limit {
            if self.returned >= limit {
                return Ok(None);
            }
        }

        while let Some(row) = self.input.next()? {
            if self.skipped < self.offset {
                self.skipped += 1;
                continue;
            }
            self.returned += 1;
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.input.close()
    }
}
