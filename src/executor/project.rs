//! Project executor
//!
//! Evaluates the select list (and any ORDER BY keys) for each input row of
//! an ungrouped select.

use crate::sql::ResolvedExpr;

use super::context::QueryContext;
use super::error::ExecutorResult;
use super::eval::eval;
use super::row::Row;
use super::{BoxedExecutor, Executor};

/// Project executor
pub struct Project<'a> {
    input: BoxedExecutor<'a>,
    /// Expressions to evaluate, with their query text
    expressions: Vec<(&'a ResolvedExpr, &'a str)>,
    ctx: &'a QueryContext<'a>,
    row_number: usize,
}

impl<'a> Project<'a> {
    pub fn new(
        input: BoxedExecutor<'a>,
        expressions: Vec<(&'a ResolvedExpr, &'a str)>,
        ctx: &'a QueryContext<'a>,
    ) -> Self {
        Project {
            input,
            expressions,
            ctx,
            row_number: 0,
        }
    }
}

impl Executor for Project<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.row_number = 0;
        self.input.open()
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        let Some(input_row) = self.input.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.expressions.len());
        for (expr, text) in &self.expressions {
            let value = eval(expr, &input_row, &self.ctx.functions)
                .map_err(|e| e.in_expression(text, self.row_number))?;
            values.push(value);
        }
        self.row_number += 1;
        Ok(Some(Row::new(values)))
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.input.close()
    }
}
