//! Filter executor
//!
//! Filters rows based on a predicate expression. Used for WHERE, and for
//! HAVING in a select without grouping.

use crate::sql::LabeledExpr;

use super::context::QueryContext;
use super::error::ExecutorResult;
use super::eval::{eval, is_true};
use super::row::Row;
use super::{BoxedExecutor, Executor};

/// Filter executor
pub struct Filter<'a> {
    input: BoxedExecutor<'a>,
    predicate: &'a LabeledExpr,
    ctx: &'a QueryContext<'a>,
    /// Input rows seen, for error messages
    row_number: usize,
    passed: usize,
}

impl<'a> Filter<'a> {
    pub fn new(input: BoxedExecutor<'a>, predicate: &'a LabeledExpr, ctx: &'a QueryContext<'a>) -> Self {
        Filter {
            input,
            predicate,
            ctx,
            row_number: 0,
            passed: 0,
        }
    }
}

impl Executor for Filter<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.row_number = 0;
        self.passed = 0;
        self.input.open()
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        while let Some(row) = self.input.next()? {
            let result = eval(&self.predicate.expr, &row, &self.ctx.functions)
                .map_err(|e| e.in_expression(&self.predicate.text, self.row_number))?;
            self.row_number += 1;
            if is_true(&result) {
                self.passed += 1;
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> ExecutorResult<()> {
        tracing::debug!(
            predicate = %self.predicate.text,
            input_rows = self.row_number,
            output_rows = self.passed,
            "Filtered rows"
        );
        self.input.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DataType, Mode, Value};
    use crate::executor::test_util::{run, MockExecutor};
    use crate::executor::ExecutorError;
    use crate::functions::get_binary_operator;
    use crate::sql::{BinaryOp, ResolvedColumn, ResolvedExpr};

    fn predicate(op: BinaryOp, right: Value) -> LabeledExpr {
        LabeledExpr {
            expr: ResolvedExpr::Call {
                function: get_binary_operator(op).unwrap(),
                args: vec![
                    ResolvedExpr::Column(ResolvedColumn {
                        table: None,
                        name: "x".into(),
                        index: 0,
                        data_type: DataType::Integer,
                        mode: Mode::Nullable,
                    }),
                    ResolvedExpr::Literal {
                        data_type: right.data_type(),
                        value: right,
                    },
                ],
                data_type: DataType::Boolean,
                mode: Mode::Nullable,
            },
            text: "x op y".into(),
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new(vec![Value::Integer(1)]),
            Row::new(vec![Value::Null]),
            Row::new(vec![Value::Integer(5)]),
            Row::new(vec![Value::Integer(10)]),
        ]
    }

    #[test]
    fn test_filter_drops_false_and_null() {
        let catalog = Catalog::new();
        let ctx = QueryContext::new(&catalog);
        let pred = predicate(BinaryOp::Gt, Value::Integer(3));
        let mut filter = Filter::new(MockExecutor::boxed(rows()), &pred, &ctx);
        let result = run(&mut filter).unwrap();
        assert_eq!(
            result,
            vec![Row::new(vec![Value::Integer(5)]), Row::new(vec![Value::Integer(10)])]
        );
    }

    #[test]
    fn test_filter_error_names_row() {
        let catalog = Catalog::new();
        let ctx = QueryContext::new(&catalog);
        let pred = predicate(BinaryOp::Div, Value::Integer(0));
        let mut filter = Filter::new(MockExecutor::boxed(rows()), &pred, &ctx);
        match run(&mut filter) {
            Err(ExecutorError::InExpression { expr, row, source }) => {
                assert_eq!(expr, "x op y");
                assert_eq!(row, 0);
                assert_eq!(*source, ExecutorError::DivisionByZero);
            }
            other => panic!("expected expression error, got {:?}", other),
        }
    }
}
