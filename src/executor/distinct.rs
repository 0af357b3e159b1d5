//! Distinct executor
//!
//! Implements SELECT DISTINCT using a hash set. Only the select-list columns
//! take part in the comparison; trailing ORDER BY keys ride along with the
//! first occurrence.

use std::collections::HashSet;

use crate::catalog::Value;

use super::error::ExecutorResult;
use super::row::Row;
use super::{BoxedExecutor, Executor};

/// Hash-based distinct executor
pub struct HashDistinct<'a> {
    input: BoxedExecutor<'a>,
    /// Number of leading columns that identify a row
    width: usize,
    seen: HashSet<Vec<Value>>,
}

impl<'a> HashDistinct<'a> {
    pub fn new(input: BoxedExecutor<'a>, width: usize) -> Self {
        HashDistinct {
            input,
            width,
            seen: HashSet::new(),
        }
    }
}

impl Executor for HashDistinct<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.seen.clear();
        self.input.open()
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        while let Some(row) = self.input.next()? {
            if self.seen.insert(row.head(self.width).to_vec()) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.seen.clear();
        self.input.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_util::{run, MockExecutor};

    fn row(values: &[i64]) -> Row {
        Row::new(values.iter().map(|&v| Value::Integer(v)).collect())
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let rows = vec![row(&[1, 10]), row(&[2, 20]), row(&[1, 30]), row(&[2, 40])];
        let mut distinct = HashDistinct::new(MockExecutor::boxed(rows), 1);
        assert_eq!(run(&mut distinct).unwrap(), vec![row(&[1, 10]), row(&[2, 20])]);
    }

    #[test]
    fn test_distinct_treats_nulls_as_equal() {
        let rows = vec![
            Row::new(vec![Value::Null]),
            Row::new(vec![Value::Null]),
            row(&[1]),
        ];
        let mut distinct = HashDistinct::new(MockExecutor::boxed(rows), 1);
        assert_eq!(run(&mut distinct).unwrap().len(), 2);
    }
}
