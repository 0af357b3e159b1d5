//! Date and time functions
//!
//! Timestamps are microseconds since the unix epoch in UTC. Functions that
//! take a point in time accept a TIMESTAMP, an INTEGER count of microseconds,
//! or an ISO-8601 STRING.

use std::fmt::Write;

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};

use super::{float_arg, int_arg, is_numeric, is_type, str_arg, Builtin, FunctionContext, FunctionRegistry};
use crate::catalog::value::{parse_timestamp, timestamp_to_datetime};
use crate::catalog::{DataType, Value};
use crate::executor::{ExecutorError, ExecutorResult};

const MICROS_PER_MILLI: i64 = 1_000;
const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.scalar(Builtin::exact("now", 0, returns_integer, now).required());
    registry.scalar(Builtin::exact("current_timestamp", 0, returns_timestamp, current_timestamp).required());
    registry.scalar(Builtin::exact("current_date", 0, returns_string, current_date).required());
    registry.scalar(Builtin::exact("current_time", 0, returns_string, current_time).required());

    registry.scalar(Builtin::exact("timestamp", 1, datetime_to_timestamp, timestamp));
    registry.scalar(Builtin::exact("usec_to_timestamp", 1, numeric_to_timestamp, usec_to_timestamp));
    registry.scalar(Builtin::exact("msec_to_timestamp", 1, numeric_to_timestamp, msec_to_timestamp));
    registry.scalar(Builtin::exact("sec_to_timestamp", 1, numeric_to_timestamp, sec_to_timestamp));
    registry.scalar(Builtin::exact("timestamp_to_usec", 1, datetime_to_integer, timestamp_to_usec));
    registry.scalar(Builtin::exact("timestamp_to_msec", 1, datetime_to_integer, timestamp_to_msec));
    registry.scalar(Builtin::exact("timestamp_to_sec", 1, datetime_to_integer, timestamp_to_sec));
    registry.scalar(Builtin::exact("parse_utc_usec", 1, string_to_integer, parse_utc_usec));

    registry.scalar(Builtin::exact("format_utc_usec", 1, datetime_to_string, format_utc_usec));
    registry.scalar(
        Builtin::exact("strftime_utc_usec", 2, check_strftime, strftime_utc_usec).literal_args(&[1]),
    );
    registry.scalar(Builtin::exact("date", 1, datetime_to_string, date));
    registry.scalar(Builtin::exact("time", 1, datetime_to_string, time));

    registry.scalar(Builtin::exact("year", 1, datetime_to_integer, year));
    registry.scalar(Builtin::exact("quarter", 1, datetime_to_integer, quarter));
    registry.scalar(Builtin::exact("month", 1, datetime_to_integer, month));
    registry.scalar(Builtin::exact("week", 1, datetime_to_integer, week));
    registry.scalar(Builtin::exact("day", 1, datetime_to_integer, day));
    registry.scalar(Builtin::exact("dayofweek", 1, datetime_to_integer, dayofweek));
    registry.scalar(Builtin::exact("dayofyear", 1, datetime_to_integer, dayofyear));
    registry.scalar(Builtin::exact("hour", 1, datetime_to_integer, hour));
    registry.scalar(Builtin::exact("minute", 1, datetime_to_integer, minute));
    registry.scalar(Builtin::exact("second", 1, datetime_to_integer, second));

    registry.scalar(Builtin::exact("date_add", 3, check_date_add, date_add).literal_args(&[2]));
    registry.scalar(Builtin::exact("datediff", 2, check_datediff, datediff));

    registry.scalar(Builtin::exact("utc_usec_to_day", 1, datetime_to_integer, utc_usec_to_day));
    registry.scalar(Builtin::exact("utc_usec_to_hour", 1, datetime_to_integer, utc_usec_to_hour));
    registry.scalar(Builtin::exact("utc_usec_to_month", 1, datetime_to_integer, utc_usec_to_month));
    registry.scalar(Builtin::exact("utc_usec_to_year", 1, datetime_to_integer, utc_usec_to_year));
    registry.scalar(
        Builtin::exact("utc_usec_to_week", 2, check_to_week, utc_usec_to_week).literal_args(&[1]),
    );
}

// ============ Type rules ============

fn is_datetime(t: DataType) -> bool {
    matches!(
        t,
        DataType::Timestamp | DataType::Integer | DataType::String | DataType::Null
    )
}

fn datetime_arg(args: &[DataType]) -> Result<(), String> {
    match args.iter().find(|t| !is_datetime(**t)) {
        Some(bad) => Err(format!(
            "expected a TIMESTAMP, INTEGER microseconds or ISO-8601 STRING, got {}",
            bad
        )),
        None => Ok(()),
    }
}

fn returns_integer(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::Integer)
}

fn returns_timestamp(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::Timestamp)
}

fn returns_string(_args: &[DataType]) -> Result<DataType, String> {
    Ok(DataType::String)
}

fn datetime_to_timestamp(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(args).map(|_| DataType::Timestamp)
}

fn datetime_to_integer(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(args).map(|_| DataType::Integer)
}

fn datetime_to_string(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(args).map(|_| DataType::String)
}

fn numeric_to_timestamp(args: &[DataType]) -> Result<DataType, String> {
    if is_numeric(args[0]) {
        Ok(DataType::Timestamp)
    } else {
        Err(format!("expected a number, got {}", args[0]))
    }
}

fn string_to_integer(args: &[DataType]) -> Result<DataType, String> {
    if is_type(args[0], DataType::String) {
        Ok(DataType::Integer)
    } else {
        Err(format!("expected STRING, got {}", args[0]))
    }
}

fn check_strftime(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(&args[..1])?;
    if !is_type(args[1], DataType::String) {
        return Err(format!("format must be STRING, got {}", args[1]));
    }
    Ok(DataType::String)
}

fn check_date_add(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(&args[..1])?;
    if !is_type(args[1], DataType::Integer) {
        return Err(format!("interval count must be INTEGER, got {}", args[1]));
    }
    if !is_type(args[2], DataType::String) {
        return Err(format!("interval unit must be STRING, got {}", args[2]));
    }
    Ok(DataType::Timestamp)
}

fn check_datediff(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(args).map(|_| DataType::Integer)
}

fn check_to_week(args: &[DataType]) -> Result<DataType, String> {
    datetime_arg(&args[..1])?;
    if !is_type(args[1], DataType::Integer) {
        return Err(format!("weekday must be INTEGER, got {}", args[1]));
    }
    Ok(DataType::Integer)
}

// ============ Conversions ============

/// Microseconds for a TIMESTAMP, INTEGER or ISO-8601 STRING value
fn to_micros(name: &str, v: &Value) -> ExecutorResult<i64> {
    match v {
        Value::Timestamp(t) | Value::Integer(t) => Ok(*t),
        Value::String(s) => parse_timestamp(s)
            .ok_or_else(|| ExecutorError::BadCast(format!("{}: '{}' is not a timestamp", name.to_uppercase(), s))),
        other => Err(ExecutorError::BadCast(format!(
            "{}: {} is not a timestamp",
            name.to_uppercase(),
            other
        ))),
    }
}

fn to_datetime(name: &str, v: &Value) -> ExecutorResult<DateTime<Utc>> {
    let micros = to_micros(name, v)?;
    timestamp_to_datetime(micros).ok_or_else(|| {
        ExecutorError::BadCast(format!("{}: {} is out of range", name.to_uppercase(), micros))
    })
}

fn micros_of(dt: DateTime<Utc>) -> Value {
    Value::Integer(dt.timestamp_micros())
}

fn scaled(name: &str, v: &Value, factor: i64) -> ExecutorResult<Value> {
    let overflow = || ExecutorError::Overflow(format!("{}({})", name.to_uppercase(), v));
    match v {
        Value::Integer(i) => i
            .checked_mul(factor)
            .map(Value::Timestamp)
            .ok_or_else(overflow),
        other => {
            let micros = (float_arg(name, other)? * factor as f64).round();
            if !micros.is_finite() || micros < i64::MIN as f64 || micros >= i64::MAX as f64 {
                return Err(overflow());
            }
            Ok(Value::Timestamp(micros as i64))
        }
    }
}

/// Render with a chrono format string, rejecting invalid specifiers
fn format_datetime(name: &str, dt: DateTime<Utc>, format: &str) -> ExecutorResult<Value> {
    let mut out = String::new();
    write!(out, "{}", dt.format(format))
        .map_err(|_| ExecutorError::function(name, format!("invalid format string '{}'", format)))?;
    Ok(Value::String(out))
}

// ============ Current time ============

fn now(_args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Integer(ctx.now_micros()))
}

fn current_timestamp(_args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Timestamp(ctx.now_micros()))
}

fn current_date(_args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    let now = to_datetime("current_date", &Value::Timestamp(ctx.now_micros()))?;
    format_datetime("current_date", now, "%Y-%m-%d")
}

fn current_time(_args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
    let now = to_datetime("current_time", &Value::Timestamp(ctx.now_micros()))?;
    format_datetime("current_time", now, "%H:%M:%S")
}

// ============ Timestamp construction and extraction ============

fn timestamp(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Timestamp(to_micros("timestamp", &args[0])?))
}

fn usec_to_timestamp(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    scaled("usec_to_timestamp", &args[0], 1)
}

fn msec_to_timestamp(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    scaled("msec_to_timestamp", &args[0], MICROS_PER_MILLI)
}

fn sec_to_timestamp(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    scaled("sec_to_timestamp", &args[0], MICROS_PER_SECOND)
}

fn timestamp_to_usec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(Value::Integer(to_micros("timestamp_to_usec", &args[0])?))
}

fn timestamp_to_msec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let micros = to_micros("timestamp_to_msec", &args[0])?;
    Ok(Value::Integer(micros.div_euclid(MICROS_PER_MILLI)))
}

fn timestamp_to_sec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let micros = to_micros("timestamp_to_sec", &args[0])?;
    Ok(Value::Integer(micros.div_euclid(MICROS_PER_SECOND)))
}

fn parse_utc_usec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let text = str_arg("parse_utc_usec", &args[0])?;
    Ok(Value::Integer(to_micros("parse_utc_usec", &Value::from(text))?))
}

fn format_utc_usec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let dt = to_datetime("format_utc_usec", &args[0])?;
    format_datetime("format_utc_usec", dt, "%Y-%m-%d %H:%M:%S%.6f")
}

fn strftime_utc_usec(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let dt = to_datetime("strftime_utc_usec", &args[0])?;
    let format = str_arg("strftime_utc_usec", &args[1])?;
    format_datetime("strftime_utc_usec", dt, format)
}

fn date(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    format_datetime("date", to_datetime("date", &args[0])?, "%Y-%m-%d")
}

fn time(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    format_datetime("time", to_datetime("time", &args[0])?, "%H:%M:%S")
}

/// Apply an integer-valued field extractor
fn extract(name: &str, v: &Value, field: fn(&DateTime<Utc>) -> i64) -> ExecutorResult<Value> {
    Ok(Value::Integer(field(&to_datetime(name, v)?)))
}

fn year(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("year", &args[0], |dt| i64::from(dt.year()))
}

fn quarter(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("quarter", &args[0], |dt| i64::from((dt.month() - 1) / 3 + 1))
}

fn month(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("month", &args[0], |dt| i64::from(dt.month()))
}

/// Week of year, Sunday-based, where the partial first week is week 1
fn week(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("week", &args[0], |dt| {
        let yday = i64::from(dt.ordinal0());
        let wday = i64::from(dt.weekday().num_days_from_sunday());
        (yday + 7 - wday) / 7 + 1
    })
}

fn day(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("day", &args[0], |dt| i64::from(dt.day()))
}

/// 1 = Sunday through 7 = Saturday
fn dayofweek(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("dayofweek", &args[0], |dt| {
        i64::from(dt.weekday().num_days_from_sunday()) + 1
    })
}

fn dayofyear(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("dayofyear", &args[0], |dt| i64::from(dt.ordinal()))
}

fn hour(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("hour", &args[0], |dt| i64::from(dt.hour()))
}

fn minute(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("minute", &args[0], |dt| i64::from(dt.minute()))
}

fn second(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    extract("second", &args[0], |dt| i64::from(dt.second()))
}

// ============ Arithmetic ============

fn shift_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

/// DATE_ADD(ts, n, unit); month arithmetic clamps to the last day of the month
fn date_add(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let dt = to_datetime("date_add", &args[0])?;
    let n = int_arg("date_add", &args[1])?;
    let unit = str_arg("date_add", &args[2])?;
    let shifted = match unit.to_ascii_uppercase().as_str() {
        "YEAR" => n.checked_mul(12).and_then(|m| shift_months(dt, m)),
        "MONTH" => shift_months(dt, n),
        "DAY" => TimeDelta::try_days(n).and_then(|d| dt.checked_add_signed(d)),
        "HOUR" => TimeDelta::try_hours(n).and_then(|d| dt.checked_add_signed(d)),
        "MINUTE" => TimeDelta::try_minutes(n).and_then(|d| dt.checked_add_signed(d)),
        "SECOND" => TimeDelta::try_seconds(n).and_then(|d| dt.checked_add_signed(d)),
        other => {
            return Err(ExecutorError::function(
                "date_add",
                format!(
                    "unknown interval '{}'; expected YEAR, MONTH, DAY, HOUR, MINUTE or SECOND",
                    other
                ),
            ))
        }
    };
    shifted
        .map(|t| Value::Timestamp(t.timestamp_micros()))
        .ok_or_else(|| ExecutorError::Overflow(format!("DATE_ADD({}, {}, {})", args[0], n, unit)))
}

/// Whole days between two points in time, rounded to the nearest day
fn datediff(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let a = to_micros("datediff", &args[0])?;
    let b = to_micros("datediff", &args[1])?;
    let days = (a as f64 - b as f64) / MICROS_PER_DAY as f64;
    Ok(Value::Integer(days.round() as i64))
}

// ============ Truncation ============

fn truncate(name: &str, v: &Value, to: fn(DateTime<Utc>) -> Option<DateTime<Utc>>) -> ExecutorResult<Value> {
    let dt = to_datetime(name, v)?;
    to(dt)
        .map(micros_of)
        .ok_or_else(|| ExecutorError::Internal(format!("{}: cannot truncate {}", name, dt)))
}

fn start_of_hour(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.with_nanosecond(0)?.with_second(0)?.with_minute(0)
}

fn start_of_day(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_hour(dt)?.with_hour(0)
}

fn start_of_month(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_day(dt)?.with_day(1)
}

fn start_of_year(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    start_of_month(dt)?.with_month(1)
}

fn utc_usec_to_day(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    truncate("utc_usec_to_day", &args[0], start_of_day)
}

fn utc_usec_to_hour(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    truncate("utc_usec_to_hour", &args[0], start_of_hour)
}

fn utc_usec_to_month(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    truncate("utc_usec_to_month", &args[0], start_of_month)
}

fn utc_usec_to_year(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    truncate("utc_usec_to_year", &args[0], start_of_year)
}

/// Start of the given weekday (0 = Sunday) in the same Sunday-based week
fn utc_usec_to_week(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let weekday = int_arg("utc_usec_to_week", &args[1])?;
    if !(0..=6).contains(&weekday) {
        return Err(ExecutorError::function(
            "utc_usec_to_week",
            format!("weekday must be between 0 and 6, got {}", weekday),
        ));
    }
    let dt = to_datetime("utc_usec_to_week", &args[0])?;
    let midnight = start_of_day(dt).unwrap_or(dt);
    let offset = weekday - i64::from(dt.weekday().num_days_from_sunday());
    let micros = midnight.timestamp_micros() + offset * MICROS_PER_DAY;
    Ok(Value::Integer(micros))
}
