//! Numeric functions and type conversions

use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};

use super::operators::compare_values;
use super::{float_arg, is_numeric, numeric_result, unify, Builtin, FunctionContext, FunctionRegistry};
use crate::catalog::value::format_timestamp;
use crate::catalog::{DataType, Value};
use crate::executor::{ExecutorError, ExecutorResult};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.scalar(Builtin::exact("abs", 1, numeric_result, abs));
    registry.scalar(Builtin::exact("floor", 1, numeric_to_float, floor));
    registry.scalar(Builtin::exact("ceil", 1, numeric_to_float, ceil));
    registry.alias("ceiling", Builtin::exact("ceiling", 1, numeric_to_float, ceil));
    registry.scalar(Builtin::new("round", 1, Some(2), check_round, round).literal_args(&[1]));
    registry.scalar(Builtin::exact("sqrt", 1, numeric_to_float, sqrt));
    registry.scalar(Builtin::exact("pow", 2, numeric_result, pow));
    registry.alias("power", Builtin::exact("power", 2, numeric_result, pow));
    registry.scalar(Builtin::exact("ln", 1, numeric_to_float, ln));
    registry.scalar(Builtin::exact("log", 1, numeric_to_float, ln));
    registry.scalar(Builtin::exact("log2", 1, numeric_to_float, log2));
    registry.scalar(Builtin::exact("log10", 1, numeric_to_float, log10));
    registry.scalar(Builtin::new("least", 2, None, check_extremum, least));
    registry.scalar(Builtin::new("greatest", 2, None, check_extremum, greatest));
    registry.scalar(Builtin::exact("rand", 0, to_float, rand).required());
    registry.scalar(Builtin::exact("hash", 1, to_integer, hash));

    registry.scalar(Builtin::exact("integer", 1, to_integer, integer).nullable());
    registry.scalar(Builtin::exact("float", 1, to_float, float).nullable());
    registry.scalar(Builtin::exact("string", 1, to_string, string));
    registry.scalar(Builtin::exact("boolean", 1, to_boolean, boolean).nullable());
}

// ============ Type rules ============

fn numeric_to_float(args: &[DataType]) -> Result<DataType, String> {
    numeric_result(args).map(|_| DataType::Float)
}

fn check_round(args: &[DataType]) -> Result<DataType, String> {
    if !is_numeric(args[0]) {
        return Err(format!("expected a number, got {}", args[0]));
    }
    if args.len() == 2 && !matches!(args[1], DataType::Integer | DataType::Null) {
        return Err(format!("expected INTEGER digits, got {}", args[1]));
    }
    Ok(DataType::Float)
}

fn check_extremum(args: &[DataType]) -> Result<DataType, String> {
    match unify(args)? {
        DataType::Record => Err("cannot compare records".to_string()),
        t => Ok(t),
    }
}

fn to_integer(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::Integer)
}

fn to_float(args: &[DataType]) -> Result<DataType, String> {
    match args.first() {
        Some(DataType::Record) => Err("cannot convert a record".to_string()),
        _ => Ok(DataType::Float),
    }
}

fn to_string(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::String)
}

fn to_boolean(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::Boolean)
}

// ============ Numeric ============

fn abs(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    match &args[0] {
        Value::Integer(i) => i
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| ExecutorError::Overflow(format!("ABS({})", i))),
        other => Ok(Value::Float(float_arg("abs", other)?.abs())),
    }
}

fn floor(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(float_arg("floor", &args[0])?.floor()))
}

fn ceil(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(float_arg("ceil", &args[0])?.ceil()))
}

fn round(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let x = float_arg("round", &args[0])?;
    let digits = match args.get(1) {
        Some(v) => super::int_arg("round", v)?,
        None => 0,
    };
    let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
    let scale = 10f64.powi(digits);
    Ok(Value::Float((x * scale).round() / scale))
}

fn sqrt(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let x = float_arg("sqrt", &args[0])?;
    if x < 0.0 {
        return Err(ExecutorError::function("sqrt", "argument is negative"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn pow(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    match (&args[0], &args[1]) {
        (Value::Integer(base), Value::Integer(exp)) => {
            let exp = u32::try_from(*exp).map_err(|_| {
                ExecutorError::function("pow", "negative INTEGER exponent; use a FLOAT base")
            })?;
            base.checked_pow(exp)
                .map(Value::Integer)
                .ok_or_else(|| ExecutorError::Overflow(format!("POW({}, {})", base, exp)))
        }
        (a, b) => Ok(Value::Float(
            float_arg("pow", a)?.powf(float_arg("pow", b)?),
        )),
    }
}

fn positive(name: &str, v: &Value) -> ExecutorResult<f64> {
    let x = float_arg(name, v)?;
    if x <= 0.0 {
        return Err(ExecutorError::function(name, "argument must be positive"));
    }
    Ok(x)
}

fn ln(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(positive("ln", &args[0])?.ln()))
}

fn log2(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(positive("log2", &args[0])?.log2()))
}

fn log10(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(positive("log10", &args[0])?.log10()))
}

fn extremum(args: &[Value], name: &str, keep: Ordering) -> ExecutorResult<Value> {
    let mut best = &args[0];
    for candidate in &args[1..] {
        if compare_values(candidate, best)? == keep {
            best = candidate;
        }
    }
    // Mixed INTEGER/FLOAT arguments produce FLOAT
    if args.iter().any(|v| matches!(v, Value::Float(_))) {
        return Ok(Value::Float(float_arg(name, best)?));
    }
    Ok(best.clone())
}

fn least(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extremum(args, "least", Ordering::Less)
}

fn greatest(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extremum(args, "greatest", Ordering::Greater)
}

fn rand(_args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Float(ctx.next_random()))
}

/// Deterministic 64-bit hash of a value
fn hash(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let mut hasher = DefaultHasher::new();
    args[0].hash(&mut hasher);
    Ok(Value::Integer(hasher.finish() as i64))
}

// ============ Conversions ============

fn integer(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(match &args[0] {
        Value::Integer(i) => Value::Integer(*i),
        Value::Float(f) => {
            let t = f.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(ExecutorError::BadCast(format!("{} does not fit INTEGER", f)));
            }
            Value::Integer(t as i64)
        }
        Value::Boolean(b) => Value::Integer(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
        Value::Timestamp(t) => Value::Integer(*t),
        other => return Err(ExecutorError::BadCast(format!("cannot convert {} to INTEGER", other))),
    })
}

fn float(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(match &args[0] {
        Value::Integer(i) => Value::Float(*i as f64),
        Value::Float(f) => Value::Float(*f),
        Value::Boolean(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        Value::Timestamp(t) => Value::Float(*t as f64),
        other => return Err(ExecutorError::BadCast(format!("cannot convert {} to FLOAT", other))),
    })
}

/// Text form used by STRING() and CONCAT
pub(crate) fn value_to_string(v: &Value) -> String {
    match v {
        Value::Float(f) => format!("{:?}", f),
        Value::Timestamp(t) => format_timestamp(*t),
        other => other.to_string(),
    }
}

fn string(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::String(value_to_string(&args[0])))
}

fn boolean(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(match &args[0] {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::Integer(i) => Value::Boolean(*i != 0),
        Value::Float(f) => Value::Boolean(*f != 0.0),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Boolean(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Boolean(false),
        Value::String(_) => Value::Null,
        other => return Err(ExecutorError::BadCast(format!("cannot convert {} to BOOLEAN", other))),
    })
}
