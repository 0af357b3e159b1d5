//! Type checking for resolved SQL statements
//!
//! The type checker verifies:
//! - Filter-like clauses (WHERE, JOIN ON, HAVING) produce BOOLEAN
//! - In a grouped select, every column reference outside an aggregate is a
//!   grouping key; matching subexpressions are rewritten to `GroupKey`

use crate::catalog::DataType;
use crate::sql::ast::*;
use crate::sql::error::{SqlError, SqlResult};

/// Type checker
pub struct TypeChecker;

impl TypeChecker {
    /// A predicate must be BOOLEAN (or the NULL literal)
    pub fn check_predicate(predicate: &LabeledExpr) -> SqlResult<()> {
        match predicate.expr.data_type() {
            DataType::Boolean | DataType::Null => Ok(()),
            other => Err(SqlError::TypeMismatch {
                expr: predicate.text.clone(),
                message: format!("expected BOOLEAN condition, got {}", other),
            }),
        }
    }

    /// Rewrite a grouped select's per-group expressions onto its keys
    pub fn bind_grouped(select: &mut ResolvedSelect) -> SqlResult<()> {
        let keys = match &select.grouping {
            Some(keys) => keys.clone(),
            None => return Ok(()),
        };
        for item in &mut select.columns {
            item.expr = Self::bind_group_keys(&item.expr, &keys)?;
        }
        if let Some(having) = &mut select.having {
            having.expr = Self::bind_group_keys(&having.expr, &keys)?;
        }
        for item in &mut select.order_by {
            item.expr.expr = Self::bind_group_keys(&item.expr.expr, &keys)?;
        }
        Ok(())
    }

    /// Replace subexpressions equal to a grouping key with a key reference
    ///
    /// Aggregates are left untouched: their arguments are evaluated per input
    /// row. Any other column reference is an error.
    pub fn bind_group_keys(expr: &ResolvedExpr, keys: &[LabeledExpr]) -> SqlResult<ResolvedExpr> {
        if let Some(index) = keys.iter().position(|k| same_expr(&k.expr, expr)) {
            return Ok(ResolvedExpr::GroupKey {
                index,
                data_type: expr.data_type(),
                mode: expr.mode(),
            });
        }
        match expr {
            ResolvedExpr::Column(col) => Err(SqlError::NotGrouped(match &col.table {
                Some(table) => format!("{}.{}", table, col.name),
                None => col.name.clone(),
            })),
            ResolvedExpr::Call {
                function,
                args,
                data_type,
                mode,
            } => {
                let mut bound = Vec::with_capacity(args.len());
                for arg in args {
                    bound.push(Self::bind_group_keys(arg, keys)?);
                }
                Ok(ResolvedExpr::Call {
                    function: *function,
                    args: bound,
                    data_type: *data_type,
                    mode: *mode,
                })
            }
            ResolvedExpr::Literal { .. }
            | ResolvedExpr::Aggregate { .. }
            | ResolvedExpr::GroupKey { .. } => Ok(expr.clone()),
        }
    }
}

/// Structural equality of resolved expressions
fn same_expr(a: &ResolvedExpr, b: &ResolvedExpr) -> bool {
    match (a, b) {
        (ResolvedExpr::Column(x), ResolvedExpr::Column(y)) => x.index == y.index,
        (
            ResolvedExpr::Literal { value: x, data_type: tx },
            ResolvedExpr::Literal { value: y, data_type: ty },
        ) => x == y && tx == ty,
        (
            ResolvedExpr::Call {
                function: f,
                args: xs,
                ..
            },
            ResolvedExpr::Call {
                function: g,
                args: ys,
                ..
            },
        ) => f.signature().name == g.signature().name && same_args(xs, ys),
        (
            ResolvedExpr::Aggregate {
                function: f,
                args: xs,
                ..
            },
            ResolvedExpr::Aggregate {
                function: g,
                args: ys,
                ..
            },
        ) => f == g && same_args(xs, ys),
        (ResolvedExpr::GroupKey { index: i, .. }, ResolvedExpr::GroupKey { index: j, .. }) => i == j,
        _ => false,
    }
}

fn same_args(xs: &[ResolvedExpr], ys: &[ResolvedExpr]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_expr(x, y))
}
