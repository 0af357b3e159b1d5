//! Sort executor
//!
//! Implements ORDER BY by collecting all rows, sorting them, then emitting.
//! Sort keys arrive precomputed as trailing columns after the first `width`
//! values; they are stripped from the output.

use std::cmp::Ordering;

use crate::catalog::Value;
use crate::functions::compare_values;

use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;
use super::{collect_rows, BoxedExecutor, Executor};

/// Sort executor
pub struct Sort<'a> {
    input: BoxedExecutor<'a>,
    /// Ascending flag per trailing key column
    ascending: Vec<bool>,
    /// Output width; key columns start here
    width: usize,
    rows: Vec<Row>,
    position: usize,
}

impl<'a> Sort<'a> {
    pub fn new(input: BoxedExecutor<'a>, ascending: Vec<bool>, width: usize) -> Self {
        Sort {
            input,
            ascending,
            width,
            rows: Vec::new(),
            position: 0,
        }
    }
}

/// Compare two key tuples; NULL sorts first in either direction
fn compare_keys(a: &[Value], b: &[Value], ascending: &[bool]) -> ExecutorResult<Ordering> {
    for ((x, y), asc) in a.iter().zip(b).zip(ascending) {
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ord = compare_values(x, y)?;
                if *asc {
                    ord
                } else {
                    ord.reverse()
                }
            }
        };
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

impl Executor for Sort<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.input.open()?;
        let mut rows = collect_rows(self.input.as_mut())?;
        self.input.close()?;

        // sort_by is stable, so ties keep their input order
        let mut failure: Option<ExecutorError> = None;
        rows.sort_by(|a, b| {
            match compare_keys(a.tail(self.width), b.tail(self.width), &self.ascending) {
                Ok(ord) => ord,
                Err(e) => {
                    failure.get_or_insert(e);
                    Ordering::Equal
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        for row in &mut rows {
            row.truncate(self.width);
        }
        self.rows = rows;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if self.position >= self.rows.len() {
            return Ok(None);
        }
        let row = std::mem::take(&mut self.rows[self.position]);
        self.position += 1;
        Ok(Some(row))
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.rows.clear();
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_util::{run, MockExecutor};

    fn row(name: &str, key: Value) -> Row {
        Row::new(vec![Value::from(name), key])
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.values()[0].to_string()).collect()
    }

    fn input() -> Vec<Row> {
        vec![
            row("b", Value::Integer(2)),
            row("n", Value::Null),
            row("a", Value::Integer(1)),
            row("b2", Value::Integer(2)),
        ]
    }

    #[test]
    fn test_sort_ascending_nulls_first_and_stable() {
        let mut sort = Sort::new(MockExecutor::boxed(input()), vec![true], 1);
        let rows = run(&mut sort).unwrap();
        assert_eq!(names(&rows), ["n", "a", "b", "b2"]);
        assert!(rows.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn test_sort_descending_keeps_nulls_first() {
        let mut sort = Sort::new(MockExecutor::boxed(input()), vec![false], 1);
        let rows = run(&mut sort).unwrap();
        assert_eq!(names(&rows), ["n", "b", "b2", "a"]);
    }

    #[test]
    fn test_sort_multiple_keys() {
        let rows = vec![
            Row::new(vec![Value::Integer(1), Value::from("x"), Value::Integer(2)]),
            Row::new(vec![Value::Integer(2), Value::from("x"), Value::Integer(1)]),
            Row::new(vec![Value::Integer(3), Value::from("a"), Value::Integer(5)]),
        ];
        let mut sort = Sort::new(MockExecutor::boxed(rows), vec![true, true], 1);
        let rows = run(&mut sort).unwrap();
        let order: Vec<Value> = rows.into_iter().flat_map(Row::into_iter).collect();
        assert_eq!(order, vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]);
    }
}
