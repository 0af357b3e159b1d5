//! Expression evaluation
//!
//! Evaluates a ResolvedExpr against a Row to produce a Value. Inside a
//! grouped select, expressions are evaluated once per group instead: group
//! keys and finished aggregate values stand in for row columns.

use crate::catalog::Value;
use crate::functions::{FunctionContext, ScalarFunction};
use crate::sql::ResolvedExpr;

use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Evaluate an expression against a row
pub fn eval(expr: &ResolvedExpr, row: &Row, ctx: &FunctionContext) -> ExecutorResult<Value> {
    match expr {
        ResolvedExpr::Column(col) => Ok(row.get(col.index)?.clone()),

        ResolvedExpr::Literal { value, .. } => Ok(value.clone()),

        ResolvedExpr::Call { function, args, .. } => {
            let values = args
                .iter()
                .map(|a| eval(a, row, ctx))
                .collect::<ExecutorResult<Vec<_>>>()?;
            apply(*function, &values, ctx)
        }

        ResolvedExpr::Aggregate { function, .. } => Err(ExecutorError::Internal(format!(
            "aggregate {} evaluated outside a group",
            function.name()
        ))),

        ResolvedExpr::GroupKey { index, .. } => Err(ExecutorError::Internal(format!(
            "group key {} evaluated outside a group",
            index
        ))),
    }
}

/// Evaluate a per-group expression
///
/// `aggregates` yields the finished aggregate values in the order
/// `collect_aggregates` found them.
pub fn eval_group<'v>(
    expr: &ResolvedExpr,
    keys: &[Value],
    aggregates: &mut impl Iterator<Item = &'v Value>,
    ctx: &FunctionContext,
) -> ExecutorResult<Value> {
    match expr {
        ResolvedExpr::Literal { value, .. } => Ok(value.clone()),

        ResolvedExpr::GroupKey { index, .. } => keys.get(*index).cloned().ok_or(
            ExecutorError::ColumnIndexOutOfBounds {
                index: *index,
                row_len: keys.len(),
            },
        ),

        ResolvedExpr::Aggregate { function, .. } => aggregates.next().cloned().ok_or_else(|| {
            ExecutorError::Internal(format!("no value computed for {}", function.name()))
        }),

        ResolvedExpr::Call { function, args, .. } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_group(arg, keys, aggregates, ctx)?);
            }
            apply(*function, &values, ctx)
        }

        ResolvedExpr::Column(col) => Err(ExecutorError::Internal(format!(
            "ungrouped column {} in grouped select",
            col.name
        ))),
    }
}

/// Collect the aggregates in an expression, outermost first, left to right
///
/// Aggregate arguments are not searched: aggregates do not nest.
pub fn collect_aggregates<'e>(expr: &'e ResolvedExpr, out: &mut Vec<&'e ResolvedExpr>) {
    match expr {
        ResolvedExpr::Aggregate { .. } => out.push(expr),
        ResolvedExpr::Call { args, .. } => {
            for arg in args {
                collect_aggregates(arg, out);
            }
        }
        _ => {}
    }
}

/// Apply a scalar function to evaluated arguments
///
/// REPEATED arguments are mapped element-wise, with scalar arguments
/// broadcast to every element. The result is then an array.
pub fn apply(
    function: &dyn ScalarFunction,
    args: &[Value],
    ctx: &FunctionContext,
) -> ExecutorResult<Value> {
    let mut width = None;
    for arg in args {
        if let Value::Array(items) = arg {
            match width {
                None => width = Some(items.len()),
                Some(w) if w != items.len() => {
                    return Err(ExecutorError::function(
                        function.signature().name,
                        format!(
                            "repeated arguments have different lengths ({} and {})",
                            w,
                            items.len()
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    let Some(width) = width else {
        return call_scalar(function, args, ctx);
    };

    let mut results = Vec::with_capacity(width);
    let mut element = Vec::with_capacity(args.len());
    for i in 0..width {
        element.clear();
        for arg in args {
            element.push(match arg {
                Value::Array(items) => items[i].clone(),
                scalar => scalar.clone(),
            });
        }
        results.push(call_scalar(function, &element, ctx)?);
    }
    Ok(Value::Array(results))
}

fn call_scalar(
    function: &dyn ScalarFunction,
    args: &[Value],
    ctx: &FunctionContext,
) -> ExecutorResult<Value> {
    if function.propagates_null() && args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    function.evaluate(args, ctx)
}

/// Whether a filter value keeps its row
///
/// Only TRUE passes; NULL and FALSE do not. A repeated predicate passes when
/// any element is TRUE.
pub fn is_true(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Array(items) => items.iter().any(is_true),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, Mode};
    use crate::functions::{get_binary_operator, get_function, tests::ctx, FunctionRef};
    use crate::sql::{BinaryOp, ResolvedColumn};

    fn make_row() -> Row {
        Row::new(vec![
            Value::Integer(1),
            Value::String("hello".into()),
            Value::Null,
            Value::Array(vec![Value::Integer(10), Value::Integer(20)]),
        ])
    }

    fn col(index: usize) -> ResolvedExpr {
        ResolvedExpr::Column(ResolvedColumn {
            table: None,
            name: format!("c{}", index),
            index,
            data_type: DataType::Integer,
            mode: Mode::Nullable,
        })
    }

    fn lit(value: Value) -> ResolvedExpr {
        let data_type = value.data_type();
        ResolvedExpr::Literal { value, data_type }
    }

    fn binary(op: BinaryOp, left: ResolvedExpr, right: ResolvedExpr) -> ResolvedExpr {
        ResolvedExpr::Call {
            function: get_binary_operator(op).unwrap(),
            args: vec![left, right],
            data_type: DataType::Integer,
            mode: Mode::Nullable,
        }
    }

    #[test]
    fn test_eval_column_and_literal() {
        let ctx = ctx();
        assert_eq!(eval(&col(1), &make_row(), &ctx).unwrap(), Value::String("hello".into()));
        assert_eq!(eval(&lit(Value::Integer(5)), &make_row(), &ctx).unwrap(), Value::Integer(5));
        assert!(eval(&col(9), &make_row(), &ctx).is_err());
    }

    #[test]
    fn test_eval_null_propagation() {
        let ctx = ctx();
        let expr = binary(BinaryOp::Add, col(0), col(2));
        assert_eq!(eval(&expr, &make_row(), &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_eval_repeated_broadcast() {
        let ctx = ctx();
        let expr = binary(BinaryOp::Add, col(3), col(0));
        assert_eq!(
            eval(&expr, &make_row(), &ctx).unwrap(),
            Value::Array(vec![Value::Integer(11), Value::Integer(21)])
        );
    }

    #[test]
    fn test_apply_mismatched_repeated_lengths() {
        let ctx = ctx();
        let add = get_binary_operator(BinaryOp::Add).unwrap();
        let result = apply(
            add,
            &[
                Value::Array(vec![Value::Integer(1)]),
                Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
            ],
            &ctx,
        );
        assert!(matches!(result, Err(ExecutorError::Function { .. })));
        let empty = apply(add, &[Value::Array(vec![]), Value::Integer(1)], &ctx).unwrap();
        assert_eq!(empty, Value::Array(vec![]));
    }

    #[test]
    fn test_eval_group() {
        let ctx = ctx();
        let Some(FunctionRef::Aggregate(count)) = get_function("count") else {
            panic!("count is an aggregate");
        };
        let aggregate = ResolvedExpr::Aggregate {
            function: count,
            args: vec![col(0)],
            data_type: DataType::Integer,
            mode: Mode::Required,
        };
        let key = ResolvedExpr::GroupKey {
            index: 0,
            data_type: DataType::Integer,
            mode: Mode::Nullable,
        };
        let expr = binary(BinaryOp::Add, key, aggregate);

        let mut found = Vec::new();
        collect_aggregates(&expr, &mut found);
        assert_eq!(found.len(), 1);

        let values = [Value::Integer(3)];
        let result = eval_group(&expr, &[Value::Integer(4)], &mut values.iter(), &ctx).unwrap();
        assert_eq!(result, Value::Integer(7));
        assert!(eval(&expr, &make_row(), &ctx).is_err());
    }

    #[test]
    fn test_is_true() {
        assert!(is_true(&Value::Boolean(true)));
        assert!(!is_true(&Value::Boolean(false)));
        assert!(!is_true(&Value::Null));
        assert!(is_true(&Value::Array(vec![Value::Boolean(false), Value::Boolean(true)])));
        assert!(!is_true(&Value::Array(vec![])));
    }
}
