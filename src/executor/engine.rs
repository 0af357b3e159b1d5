//! Executor engine
//!
//! Builds executor trees from resolved selects and runs them. Phases run in
//! a fixed order: FROM (scan/subquery/join), WHERE, GROUP BY + HAVING (or
//! projection), DISTINCT, ORDER BY, LIMIT/OFFSET.

use std::time::Instant;

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::sql::{ResolvedExpr, ResolvedSelect, ResolvedTableExpr};

use super::aggregate::HashAggregate;
use super::context::QueryContext;
use super::distinct::HashDistinct;
use super::error::{ExecutorError, ExecutorResult};
use super::filter::Filter;
use super::join::NestedLoopJoin;
use super::limit::Limit;
use super::project::Project;
use super::result::ResultTable;
use super::scan::TableScan;
use super::single_row::SingleRow;
use super::sort::Sort;
use super::{collect_rows, BoxedExecutor};

/// Executor engine - builds executors from resolved selects
pub struct ExecutorEngine<'a> {
    ctx: &'a QueryContext<'a>,
}

impl<'a> ExecutorEngine<'a> {
    pub fn new(ctx: &'a QueryContext<'a>) -> Self {
        ExecutorEngine { ctx }
    }

    /// Build the operator tree for a select; rows come out in select-list shape
    pub fn build(&self, select: &'a ResolvedSelect) -> ExecutorResult<BoxedExecutor<'a>> {
        let mut node: BoxedExecutor<'a> = match &select.from {
            Some(from) => self.build_source(from)?,
            None => Box::new(SingleRow::new()),
        };

        if let Some(filter) = &select.filter {
            node = Box::new(Filter::new(node, filter, self.ctx));
        }

        let mut outputs: Vec<(&'a ResolvedExpr, &'a str)> = select
            .columns
            .iter()
            .map(|item| (&item.expr, item.text.as_str()))
            .collect();
        outputs.extend(
            select
                .order_by
                .iter()
                .map(|item| (&item.expr.expr, item.expr.text.as_str())),
        );

        node = match &select.grouping {
            Some(keys) => Box::new(HashAggregate::new(node, select, keys, self.ctx)),
            None => {
                // Without grouping, HAVING filters rows like a second WHERE
                let input: BoxedExecutor<'a> = match &select.having {
                    Some(having) => Box::new(Filter::new(node, having, self.ctx)),
                    None => node,
                };
                Box::new(Project::new(input, outputs, self.ctx))
            }
        };

        let width = select.columns.len();
        if select.distinct {
            node = Box::new(HashDistinct::new(node, width));
        }

        if !select.order_by.is_empty() {
            let ascending = select.order_by.iter().map(|item| item.ascending).collect();
            node = Box::new(Sort::new(node, ascending, width));
        }

        if select.limit.is_some() || select.offset.is_some() {
            node = Box::new(Limit::new(node, select.limit, select.offset));
        }

        Ok(node)
    }

    fn build_source(&self, from: &'a ResolvedTableExpr) -> ExecutorResult<BoxedExecutor<'a>> {
        match from {
            ResolvedTableExpr::Table { name, .. } => {
                let table = self
                    .ctx
                    .catalog
                    .get_table(name)
                    .map_err(|_| ExecutorError::TableNotFound(name.clone()))?;
                Ok(Box::new(TableScan::new(table)))
            }

            ResolvedTableExpr::Subquery(select) => self.build(select),

            ResolvedTableExpr::Join {
                left,
                right,
                join_type,
                condition,
                right_width,
                ..
            } => {
                let left = self.build_source(left)?;
                let right = self.build_source(right)?;
                Ok(Box::new(NestedLoopJoin::new(
                    left,
                    right,
                    *join_type,
                    condition.as_ref(),
                    *right_width,
                    self.ctx,
                )))
            }
        }
    }
}

/// Evaluate a resolved select against the catalog
pub fn execute(select: &ResolvedSelect, catalog: &Catalog) -> ExecutorResult<ResultTable> {
    let started = Instant::now();
    let ctx = QueryContext::new(catalog);
    let engine = ExecutorEngine::new(&ctx);

    let mut root = engine.build(select)?;
    root.open()?;
    let rows = collect_rows(root.as_mut())?;
    root.close()?;

    debug!(
        grouped = select.grouping.is_some(),
        distinct = select.distinct,
        order_keys = select.order_by.len(),
        "Executed select"
    );
    info!(
        columns = select.schema.len(),
        rows = rows.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Query complete"
    );

    let rows = rows.into_iter().map(|row| row.into_values()).collect();
    Ok(ResultTable::new(select.schema.clone(), rows))
}
