//! Arithmetic, comparison, logical and null-test operators

use std::cmp::Ordering;

use super::{
    all_of, bool_arg, float_arg, is_numeric, numeric_result, str_arg, Builtin, FunctionContext,
    FunctionRegistry,
};
use crate::catalog::value::{normalize_float, parse_timestamp};
use crate::catalog::{DataType, Value};
use crate::executor::{ExecutorError, ExecutorResult};
use crate::sql::ast::{BinaryOp, UnaryOp};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.binary(BinaryOp::Add, Builtin::exact("+", 2, numeric_result, add));
    registry.binary(BinaryOp::Sub, Builtin::exact("-", 2, numeric_result, sub));
    registry.binary(BinaryOp::Mul, Builtin::exact("*", 2, numeric_result, mul));
    registry.binary(BinaryOp::Div, Builtin::exact("/", 2, check_div, div));
    registry.binary(BinaryOp::Mod, Builtin::exact("%", 2, numeric_result, modulo));

    registry.binary(BinaryOp::Eq, Builtin::exact("=", 2, check_comparison, eq));
    registry.binary(BinaryOp::NotEq, Builtin::exact("!=", 2, check_comparison, not_eq));
    registry.binary(BinaryOp::Lt, Builtin::exact("<", 2, check_comparison, lt));
    registry.binary(BinaryOp::LtEq, Builtin::exact("<=", 2, check_comparison, lt_eq));
    registry.binary(BinaryOp::Gt, Builtin::exact(">", 2, check_comparison, gt));
    registry.binary(BinaryOp::GtEq, Builtin::exact(">=", 2, check_comparison, gt_eq));

    registry.binary(
        BinaryOp::And,
        Builtin::exact("AND", 2, check_boolean, and).handles_null(),
    );
    registry.binary(
        BinaryOp::Or,
        Builtin::exact("OR", 2, check_boolean, or).handles_null(),
    );
    registry.binary(
        BinaryOp::Contains,
        Builtin::exact("CONTAINS", 2, check_contains, contains),
    );

    registry.unary(UnaryOp::Not, Builtin::exact("NOT", 1, check_boolean, not));
    registry.unary(UnaryOp::Neg, Builtin::exact("-", 1, numeric_result, neg));
    registry.unary(
        UnaryOp::IsNull,
        Builtin::exact("IS NULL", 1, any_to_boolean, is_null)
            .handles_null()
            .required(),
    );
    registry.unary(
        UnaryOp::IsNotNull,
        Builtin::exact("IS NOT NULL", 1, any_to_boolean, is_not_null)
            .handles_null()
            .required(),
    );
}

// ============ Type rules ============

fn check_div(args: &[DataType]) -> Result<DataType, String> {
    numeric_result(args).map(|_| DataType::Float)
}

fn check_boolean(args: &[DataType]) -> Result<DataType, String> {
    all_of(args, DataType::Boolean).map(|_| DataType::Boolean)
}

fn check_contains(args: &[DataType]) -> Result<DataType, String> {
    all_of(args, DataType::String).map(|_| DataType::Boolean)
}

fn any_to_boolean(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::Boolean)
}

/// Types two comparison operands may have
pub(crate) fn comparable(a: DataType, b: DataType) -> bool {
    use DataType::*;
    match (a, b) {
        (Null, _) | (_, Null) => true,
        (Record, _) | (_, Record) => false,
        (x, y) if x == y => true,
        (x, y) if is_numeric(x) && is_numeric(y) => true,
        (String, Timestamp) | (Timestamp, String) => true,
        (Integer, Timestamp) | (Timestamp, Integer) => true,
        _ => false,
    }
}

fn check_comparison(args: &[DataType]) -> Result<DataType, String> {
    if comparable(args[0], args[1]) {
        Ok(DataType::Boolean)
    } else {
        Err(format!("cannot compare {} with {}", args[0], args[1]))
    }
}

// ============ Arithmetic ============

fn arithmetic(
    args: &[Value],
    op: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> ExecutorResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Integer(a), Value::Integer(b)) => int_op(*a, *b)
            .map(Value::Integer)
            .ok_or_else(|| ExecutorError::Overflow(format!("{} {} {}", a, op, b))),
        (a, b) => Ok(Value::Float(float_op(
            float_arg(op, a)?,
            float_arg(op, b)?,
        ))),
    }
}

fn add(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    arithmetic(args, "+", i64::checked_add, |a, b| a + b)
}

fn sub(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    arithmetic(args, "-", i64::checked_sub, |a, b| a - b)
}

fn mul(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    arithmetic(args, "*", i64::checked_mul, |a, b| a * b)
}

/// Division always yields FLOAT
fn div(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let a = float_arg("/", &args[0])?;
    let b = float_arg("/", &args[1])?;
    if b == 0.0 {
        return Err(ExecutorError::DivisionByZero);
    }
    Ok(Value::Float(a / b))
}

fn modulo(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let divisor_is_zero = match &args[1] {
        Value::Integer(b) => *b == 0,
        Value::Float(b) => *b == 0.0,
        _ => false,
    };
    if divisor_is_zero {
        return Err(ExecutorError::DivisionByZero);
    }
    arithmetic(args, "%", i64::checked_rem, |a, b| a % b)
}

fn neg(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    match &args[0] {
        Value::Integer(i) => i
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| ExecutorError::Overflow(format!("-({})", i))),
        other => Ok(Value::Float(-float_arg("-", other)?)),
    }
}

// ============ Comparison ============

fn timestamp_from_string(s: &str) -> ExecutorResult<i64> {
    parse_timestamp(s).ok_or_else(|| ExecutorError::BadCast(format!("'{}' is not a timestamp", s)))
}

/// Compare two non-NULL values of comparable types
///
/// This is the total order used by ORDER BY, MIN/MAX and GREATEST/LEAST;
/// predicates go through [`compare_sql`] instead.
pub(crate) fn compare_values(a: &Value, b: &Value) -> ExecutorResult<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y))
        | (Value::Timestamp(x), Value::Integer(y))
        | (Value::Integer(x), Value::Timestamp(y)) => Ok(x.cmp(y)),
        (Value::String(s), Value::Timestamp(t)) => Ok(timestamp_from_string(s)?.cmp(t)),
        (Value::Timestamp(t), Value::String(s)) => Ok(t.cmp(&timestamp_from_string(s)?)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(y)),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let x = float_arg("comparison", a)?;
            let y = float_arg("comparison", b)?;
            Ok(normalize_float(x).total_cmp(&normalize_float(y)))
        }
        _ => Err(ExecutorError::function(
            "comparison",
            format!("cannot compare {} with {}", a, b),
        )),
    }
}

/// IEEE comparison for predicates: `-0.0 = 0.0`, and NaN is unordered
pub(crate) fn compare_sql(a: &Value, b: &Value) -> ExecutorResult<Option<Ordering>> {
    match (a, b) {
        (Value::Float(_), Value::Integer(_) | Value::Float(_))
        | (Value::Integer(_), Value::Float(_)) => {
            let x = float_arg("comparison", a)?;
            let y = float_arg("comparison", b)?;
            Ok(x.partial_cmp(&y))
        }
        _ => compare_values(a, b).map(Some),
    }
}

fn compare(args: &[Value], test: fn(Option<Ordering>) -> bool) -> ExecutorResult<Value> {
    compare_sql(&args[0], &args[1]).map(|ord| Value::Boolean(test(ord)))
}

fn eq(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord == Some(Ordering::Equal))
}

fn not_eq(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord != Some(Ordering::Equal))
}

fn lt(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord == Some(Ordering::Less))
}

fn lt_eq(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord.is_some_and(Ordering::is_le))
}

fn gt(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord == Some(Ordering::Greater))
}

fn gt_eq(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    compare(args, |ord| ord.is_some_and(Ordering::is_ge))
}

// ============ Logical ============

/// Ternary AND: FALSE wins over NULL
fn and(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let a = nullable_bool("AND", &args[0])?;
    let b = nullable_bool("AND", &args[1])?;
    Ok(match (a, b) {
        (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
        (Some(true), Some(true)) => Value::Boolean(true),
        _ => Value::Null,
    })
}

/// Ternary OR: TRUE wins over NULL
fn or(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let a = nullable_bool("OR", &args[0])?;
    let b = nullable_bool("OR", &args[1])?;
    Ok(match (a, b) {
        (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
        (Some(false), Some(false)) => Value::Boolean(false),
        _ => Value::Null,
    })
}

fn nullable_bool(name: &str, v: &Value) -> ExecutorResult<Option<bool>> {
    if v.is_null() {
        Ok(None)
    } else {
        bool_arg(name, v).map(Some)
    }
}

fn not(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Boolean(!bool_arg("NOT", &args[0])?))
}

fn contains(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let haystack = str_arg("CONTAINS", &args[0])?;
    let needle = str_arg("CONTAINS", &args[1])?;
    Ok(Value::Boolean(haystack.contains(needle)))
}

fn is_null(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Boolean(args[0].is_null()))
}

fn is_not_null(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Boolean(!args[0].is_null()))
}
