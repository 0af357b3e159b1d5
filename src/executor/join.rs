//! Join executor
//!
//! Implements nested loop join for INNER, LEFT OUTER and CROSS joins. The
//! right side is materialized once; left rows stream.

use crate::catalog::Value;
use crate::sql::{JoinType, LabeledExpr};

use super::context::QueryContext;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::{eval, is_true};
use super::row::Row;
use super::{collect_rows, BoxedExecutor, Executor};

/// Nested loop join executor
pub struct NestedLoopJoin<'a> {
    left: BoxedExecutor<'a>,
    right: BoxedExecutor<'a>,
    join_type: JoinType,
    condition: Option<&'a LabeledExpr>,
    /// Number of right-side columns, used to pad unmatched left rows
    right_width: usize,
    ctx: &'a QueryContext<'a>,
    /// Materialized right side rows
    right_rows: Vec<Row>,
    current_left: Option<Row>,
    /// Number of left rows consumed, for error messages
    left_number: usize,
    right_position: usize,
    /// Whether the current left row matched any right row
    left_matched: bool,
    /// Rows emitted so far, checked against the configured bound
    produced: usize,
}

impl<'a> NestedLoopJoin<'a> {
    pub fn new(
        left: BoxedExecutor<'a>,
        right: BoxedExecutor<'a>,
        join_type: JoinType,
        condition: Option<&'a LabeledExpr>,
        right_width: usize,
        ctx: &'a QueryContext<'a>,
    ) -> Self {
        NestedLoopJoin {
            left,
            right,
            join_type,
            condition,
            right_width,
            ctx,
            right_rows: Vec::new(),
            current_left: None,
            left_number: 0,
            right_position: 0,
            left_matched: false,
            produced: 0,
        }
    }

    /// Right-side padding for an unmatched left row: all NULL
    fn padding(&self) -> Row {
        Row::new(vec![Value::Null; self.right_width])
    }

    fn matches(&self, combined: &Row) -> ExecutorResult<bool> {
        match self.condition {
            Some(cond) => {
                let result = eval(&cond.expr, combined, &self.ctx.functions)
                    .map_err(|e| e.in_expression(&cond.text, self.left_number))?;
                Ok(is_true(&result))
            }
            None => Ok(true),
        }
    }

    fn emit(&mut self, row: Row) -> ExecutorResult<Option<Row>> {
        self.produced += 1;
        if let Some(limit) = self.ctx.max_intermediate_rows {
            if self.produced > limit {
                return Err(ExecutorError::ResourceLimit(format!(
                    "join produced more than {} rows",
                    limit
                )));
            }
        }
        Ok(Some(row))
    }

    fn advance_left(&mut self) -> ExecutorResult<()> {
        if self.current_left.is_some() {
            self.left_number += 1;
        }
        self.current_left = self.left.next()?;
        self.right_position = 0;
        self.left_matched = false;
        Ok(())
    }
}

impl Executor for NestedLoopJoin<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.left.open()?;
        self.right.open()?;

        self.right_rows = collect_rows(self.right.as_mut())?;
        tracing::debug!(
            join_type = ?self.join_type,
            right_rows = self.right_rows.len(),
            "Materialized join right side"
        );

        self.left_number = 0;
        self.produced = 0;
        self.current_left = None;
        self.advance_left()
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        while let Some(left_row) = self.current_left.take() {
            while self.right_position < self.right_rows.len() {
                let combined = left_row.concat(&self.right_rows[self.right_position]);
                self.right_position += 1;

                if self.matches(&combined)? {
                    self.left_matched = true;
                    self.current_left = Some(left_row);
                    return self.emit(combined);
                }
            }

            let pad = !self.left_matched && self.join_type == JoinType::LeftOuter;
            let padded = pad.then(|| left_row.concat(&self.padding()));

            self.current_left = Some(left_row);
            self.advance_left()?;

            if let Some(row) = padded {
                return self.emit(row);
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.right_rows.clear();
        self.current_left = None;
        self.left.close()?;
        self.right.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DataType, Mode};
    use crate::config::EngineConfig;
    use crate::executor::test_util::{run, MockExecutor};
    use crate::functions::get_binary_operator;
    use crate::sql::{BinaryOp, ResolvedColumn, ResolvedExpr};

    fn col(index: usize) -> ResolvedExpr {
        ResolvedExpr::Column(ResolvedColumn {
            table: None,
            name: format!("c{}", index),
            index,
            data_type: DataType::Integer,
            mode: Mode::Nullable,
        })
    }

    /// left.c0 = right.c0 over a one-column left and two-column right
    fn eq_condition() -> LabeledExpr {
        LabeledExpr {
            expr: ResolvedExpr::Call {
                function: get_binary_operator(BinaryOp::Eq).unwrap(),
                args: vec![col(0), col(1)],
                data_type: DataType::Boolean,
                mode: Mode::Nullable,
            },
            text: "l.id = r.id".to_string(),
        }
    }

    fn left_rows() -> Vec<Row> {
        vec![
            Row::new(vec![Value::Integer(1)]),
            Row::new(vec![Value::Integer(2)]),
            Row::new(vec![Value::Integer(3)]),
        ]
    }

    fn right_rows() -> Vec<Row> {
        vec![
            Row::new(vec![Value::Integer(1), Value::from("a")]),
            Row::new(vec![Value::Integer(3), Value::from("c")]),
            Row::new(vec![Value::Integer(3), Value::from("cc")]),
        ]
    }

    const RIGHT_WIDTH: usize = 2;

    #[test]
    fn test_inner_join() {
        let catalog = Catalog::new();
        let ctx = QueryContext::new(&catalog);
        let cond = eq_condition();
        let mut join = NestedLoopJoin::new(
            MockExecutor::boxed(left_rows()),
            MockExecutor::boxed(right_rows()),
            JoinType::Inner,
            Some(&cond),
            RIGHT_WIDTH,
            &ctx,
        );
        let rows = run(&mut join).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values()[2], Value::from("a"));
        assert_eq!(rows[2].values()[2], Value::from("cc"));
    }

    #[test]
    fn test_left_outer_join_pads_with_null() {
        let catalog = Catalog::new();
        let ctx = QueryContext::new(&catalog);
        let cond = eq_condition();
        let mut join = NestedLoopJoin::new(
            MockExecutor::boxed(left_rows()),
            MockExecutor::boxed(right_rows()),
            JoinType::LeftOuter,
            Some(&cond),
            RIGHT_WIDTH,
            &ctx,
        );
        let rows = run(&mut join).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[1],
            Row::new(vec![Value::Integer(2), Value::Null, Value::Null])
        );
    }

    #[test]
    fn test_cross_join_and_empty_side() {
        let catalog = Catalog::new();
        let ctx = QueryContext::new(&catalog);
        let mut join = NestedLoopJoin::new(
            MockExecutor::boxed(left_rows()),
            MockExecutor::boxed(right_rows()),
            JoinType::Cross,
            None,
            RIGHT_WIDTH,
            &ctx,
        );
        assert_eq!(run(&mut join).unwrap().len(), 9);

        let mut join = NestedLoopJoin::new(
            MockExecutor::boxed(left_rows()),
            MockExecutor::boxed(vec![]),
            JoinType::Cross,
            None,
            RIGHT_WIDTH,
            &ctx,
        );
        assert!(run(&mut join).unwrap().is_empty());
    }

    #[test]
    fn test_intermediate_row_limit() {
        let catalog = Catalog::with_config(EngineConfig::new().with_max_intermediate_rows(5));
        let ctx = QueryContext::new(&catalog);
        let mut join = NestedLoopJoin::new(
            MockExecutor::boxed(left_rows()),
            MockExecutor::boxed(right_rows()),
            JoinType::Cross,
            None,
            RIGHT_WIDTH,
            &ctx,
        );
        assert!(matches!(run(&mut join), Err(ExecutorError::ResourceLimit(_))));
    }
}
