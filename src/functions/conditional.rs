//! Conditional functions: IF, IFNULL, COALESCE, IN

use std::cmp::Ordering;

use super::operators::{comparable, compare_sql};
use super::{is_type, unify, Builtin, FunctionContext, FunctionRegistry};
use crate::catalog::{DataType, Value};
use crate::executor::{ExecutorError, ExecutorResult};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.scalar(Builtin::exact("if", 3, check_if, if_).handles_null());
    registry.scalar(Builtin::exact("ifnull", 2, check_same, ifnull).handles_null());
    registry.scalar(Builtin::new("coalesce", 1, None, check_same, coalesce).handles_null());
    registry.scalar(Builtin::new("in", 2, None, check_in, in_list).handles_null());
}

fn check_if(args: &[DataType]) -> Result<DataType, String> {
    if !is_type(args[0], DataType::Boolean) {
        return Err(format!("IF condition must be BOOLEAN, got {}", args[0]));
    }
    unify(&args[1..])
}

fn check_same(args: &[DataType]) -> Result<DataType, String> {
    unify(args)
}

fn check_in(args: &[DataType]) -> Result<DataType, String> {
    match args[1..].iter().find(|t| !comparable(args[0], **t)) {
        Some(bad) => Err(format!("cannot compare {} with {}", args[0], bad)),
        None => Ok(DataType::Boolean),
    }
}

/// A NULL condition selects the else branch
fn if_(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    match &args[0] {
        Value::Boolean(true) => Ok(args[1].clone()),
        Value::Boolean(false) | Value::Null => Ok(args[2].clone()),
        other => Err(ExecutorError::function(
            "if",
            format!("condition must be BOOLEAN, got {}", other),
        )),
    }
}

fn ifnull(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    if args[0].is_null() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn coalesce(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

/// `x IN (a, b, ...)`: TRUE on a match, else NULL if `x` or any candidate is NULL
fn in_list(args: &[Value], _ctx: &FunctionContext) -> ExecutorResult<Value> {
    let needle = &args[0];
    if needle.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for candidate in &args[1..] {
        if candidate.is_null() {
            saw_null = true;
        } else if compare_sql(needle, candidate)? == Some(Ordering::Equal) {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(if saw_null {
        Value::Null
    } else {
        Value::Boolean(false)
    })
}
