//! Aggregate executor
//!
//! Implements GROUP BY (and the implicit single group of an aggregate query
//! without GROUP BY) with hash grouping. Groups are emitted in the order
//! their first row arrived.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::catalog::Value;
use crate::functions::{compare_values, AggregateFunc};
use crate::sql::{LabeledExpr, ResolvedExpr, ResolvedSelect};

use super::context::QueryContext;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::{collect_aggregates, eval, eval_group, is_true};
use super::row::Row;
use super::{BoxedExecutor, Executor};

/// Running state of one aggregate within one group
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    CountDistinct(HashSet<Value>),
    Sum(Sum),
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Nth { n: i64, seen: i64, value: Option<Value> },
    GroupConcat { separator: String, out: Option<String> },
    /// Welford's running mean and sum of squared deviations
    Moments {
        func: AggregateFunc,
        count: i64,
        mean: f64,
        m2: f64,
    },
    Quantiles { buckets: i64, values: Vec<Value> },
}

#[derive(Debug, Clone, Copy)]
enum Sum {
    Empty,
    Int(i64),
    Float(f64),
}

impl Accumulator {
    /// Fresh state for `func`; literal parameters are read from `args`
    fn new(func: AggregateFunc, args: &[ResolvedExpr]) -> ExecutorResult<Self> {
        Ok(match func {
            AggregateFunc::Count => Accumulator::Count(0),
            AggregateFunc::CountDistinct => Accumulator::CountDistinct(HashSet::new()),
            AggregateFunc::Sum => Accumulator::Sum(Sum::Empty),
            AggregateFunc::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunc::Min => Accumulator::Min(None),
            AggregateFunc::Max => Accumulator::Max(None),
            AggregateFunc::First => Accumulator::First(None),
            AggregateFunc::Nth => Accumulator::Nth {
                n: literal_int(func, args, 0)?,
                seen: 0,
                value: None,
            },
            AggregateFunc::GroupConcat => {
                let separator = match args.get(1) {
                    Some(ResolvedExpr::Literal {
                        value: Value::String(s),
                        ..
                    }) => s.clone(),
                    Some(ResolvedExpr::Literal { value: Value::Null, .. }) | None => ",".to_string(),
                    Some(_) => {
                        return Err(ExecutorError::function(
                            func.name(),
                            "separator must be a string literal",
                        ))
                    }
                };
                Accumulator::GroupConcat {
                    separator,
                    out: None,
                }
            }
            AggregateFunc::StddevSamp
            | AggregateFunc::StddevPop
            | AggregateFunc::VarSamp
            | AggregateFunc::VarPop => Accumulator::Moments {
                func,
                count: 0,
                mean: 0.0,
                m2: 0.0,
            },
            AggregateFunc::Quantiles => {
                let buckets = literal_int(func, args, 1)?;
                if buckets < 2 {
                    return Err(ExecutorError::function(
                        func.name(),
                        format!("need at least 2 quantiles, got {}", buckets),
                    ));
                }
                Accumulator::Quantiles {
                    buckets,
                    values: Vec::new(),
                }
            }
        })
    }

    /// Feed one row's value; REPEATED values feed each element
    fn accumulate(&mut self, value: &Value) -> ExecutorResult<()> {
        if let Value::Array(items) = value {
            for item in items {
                self.accumulate(item)?;
            }
            return Ok(());
        }

        match self {
            Accumulator::First(first) => {
                if first.is_none() {
                    *first = Some(value.clone());
                }
                return Ok(());
            }
            Accumulator::Nth { n, seen, value: slot } => {
                *seen += 1;
                if *seen == *n {
                    *slot = Some(value.clone());
                }
                return Ok(());
            }
            _ => {}
        }

        if value.is_null() {
            return Ok(());
        }

        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::CountDistinct(seen) => {
                seen.insert(value.clone());
            }
            Accumulator::Sum(sum) => {
                *sum = match (*sum, value) {
                    (Sum::Empty, Value::Integer(v)) => Sum::Int(*v),
                    (Sum::Int(acc), Value::Integer(v)) => Sum::Int(
                        acc.checked_add(*v)
                            .ok_or_else(|| ExecutorError::Overflow("SUM".to_string()))?,
                    ),
                    (Sum::Empty, Value::Float(v)) => Sum::Float(*v),
                    (Sum::Int(acc), Value::Float(v)) => Sum::Float(acc as f64 + v),
                    (Sum::Float(acc), Value::Float(v)) => Sum::Float(acc + v),
                    (Sum::Float(acc), Value::Integer(v)) => Sum::Float(acc + *v as f64),
                    (_, other) => {
                        return Err(ExecutorError::function(
                            "sum",
                            format!("cannot add {}", other),
                        ))
                    }
                };
            }
            Accumulator::Avg { sum, count } => {
                *sum += number("avg", value)?;
                *count += 1;
            }
            Accumulator::Min(min) => match min {
                Some(m) if compare_values(value, m)? != Ordering::Less => {}
                _ => *min = Some(value.clone()),
            },
            Accumulator::Max(max) => match max {
                Some(m) if compare_values(value, m)? != Ordering::Greater => {}
                _ => *max = Some(value.clone()),
            },
            Accumulator::GroupConcat { separator, out } => {
                let text = value.to_string();
                match out {
                    Some(s) => {
                        s.push_str(separator);
                        s.push_str(&text);
                    }
                    None => *out = Some(text),
                }
            }
            Accumulator::Moments {
                func,
                count,
                mean,
                m2,
            } => {
                let x = number(func.name(), value)?;
                *count += 1;
                let delta = x - *mean;
                *mean += delta / *count as f64;
                *m2 += delta * (x - *mean);
            }
            Accumulator::Quantiles { values, .. } => values.push(value.clone()),
            Accumulator::First(_) | Accumulator::Nth { .. } => {}
        }
        Ok(())
    }

    fn finalize(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Integer(n),
            Accumulator::CountDistinct(seen) => Value::Integer(seen.len() as i64),
            Accumulator::Sum(Sum::Empty) => Value::Null,
            Accumulator::Sum(Sum::Int(v)) => Value::Integer(v),
            Accumulator::Sum(Sum::Float(v)) => Value::Float(v),
            Accumulator::Avg { sum, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / count as f64)
                }
            }
            Accumulator::Min(v)
            | Accumulator::Max(v)
            | Accumulator::First(v)
            | Accumulator::Nth { value: v, .. } => v.unwrap_or(Value::Null),
            Accumulator::GroupConcat { out, .. } => out.map(Value::String).unwrap_or(Value::Null),
            Accumulator::Moments {
                func, count, m2, ..
            } => {
                let sample = matches!(func, AggregateFunc::StddevSamp | AggregateFunc::VarSamp);
                let divisor = if sample { count - 1 } else { count };
                if divisor <= 0 {
                    return Value::Null;
                }
                let variance = m2 / divisor as f64;
                match func {
                    AggregateFunc::StddevSamp | AggregateFunc::StddevPop => {
                        Value::Float(variance.sqrt())
                    }
                    _ => Value::Float(variance),
                }
            }
            Accumulator::Quantiles {
                buckets,
                mut values,
            } => {
                if values.is_empty() {
                    return Value::Array(Vec::new());
                }
                values.sort();
                let len = values.len();
                let buckets = buckets as usize;
                let picks = (0..buckets)
                    .map(|i| values[(len * i / (buckets - 1)).min(len - 1)].clone())
                    .collect();
                Value::Array(picks)
            }
        }
    }
}

fn literal_int(func: AggregateFunc, args: &[ResolvedExpr], position: usize) -> ExecutorResult<i64> {
    match args.get(position) {
        Some(ResolvedExpr::Literal {
            value: Value::Integer(n),
            ..
        }) => Ok(*n),
        _ => Err(ExecutorError::function(
            func.name(),
            format!("argument {} must be an integer literal", position + 1),
        )),
    }
}

fn number(name: &str, value: &Value) -> ExecutorResult<f64> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(ExecutorError::function(
            name,
            format!("expected a number, got {}", other),
        )),
    }
}

/// One aggregate call site: the function, its arguments and the text of the
/// select item (or clause) it appears in
struct AggregateSpec<'a> {
    func: AggregateFunc,
    args: &'a [ResolvedExpr],
    text: &'a str,
}

/// Hash aggregate executor
///
/// Output rows are the select list followed by the ORDER BY keys, each
/// evaluated once per group. Groups failing HAVING are dropped.
pub struct HashAggregate<'a> {
    input: BoxedExecutor<'a>,
    keys: &'a [LabeledExpr],
    /// HAVING, select items, then ORDER BY keys; aggregates are collected in
    /// the same order
    outputs: Vec<(&'a ResolvedExpr, &'a str)>,
    has_having: bool,
    ctx: &'a QueryContext<'a>,
    output: Vec<Row>,
    position: usize,
}

impl<'a> HashAggregate<'a> {
    pub fn new(
        input: BoxedExecutor<'a>,
        select: &'a ResolvedSelect,
        keys: &'a [LabeledExpr],
        ctx: &'a QueryContext<'a>,
    ) -> Self {
        let mut outputs = Vec::new();
        if let Some(having) = &select.having {
            outputs.push((&having.expr, having.text.as_str()));
        }
        for item in &select.columns {
            outputs.push((&item.expr, item.text.as_str()));
        }
        for item in &select.order_by {
            outputs.push((&item.expr.expr, item.expr.text.as_str()));
        }
        HashAggregate {
            input,
            keys,
            outputs,
            has_having: select.having.is_some(),
            ctx,
            output: Vec::new(),
            position: 0,
        }
    }

    fn aggregate_specs(&self) -> Vec<AggregateSpec<'a>> {
        let mut specs = Vec::new();
        for &(expr, text) in &self.outputs {
            let mut found = Vec::new();
            collect_aggregates(expr, &mut found);
            for aggregate in found {
                if let ResolvedExpr::Aggregate { function, args, .. } = aggregate {
                    specs.push(AggregateSpec {
                        func: *function,
                        args,
                        text,
                    });
                }
            }
        }
        specs
    }

    fn new_accumulators(specs: &[AggregateSpec<'_>]) -> ExecutorResult<Vec<Accumulator>> {
        specs
            .iter()
            .map(|spec| Accumulator::new(spec.func, spec.args))
            .collect()
    }
}

impl Executor for HashAggregate<'_> {
    fn open(&mut self) -> ExecutorResult<()> {
        self.output.clear();
        self.position = 0;

        let specs = self.aggregate_specs();
        let ctx = self.ctx;
        let functions = &ctx.functions;
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();

        self.input.open()?;
        let mut row_number = 0;
        while let Some(row) = self.input.next()? {
            let mut key = Vec::with_capacity(self.keys.len());
            for k in self.keys {
                let value = eval(&k.expr, &row, functions)
                    .map_err(|e| e.in_expression(&k.text, row_number))?;
                key.push(value);
            }

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push((key.clone(), Self::new_accumulators(&specs)?));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let accumulators = &mut groups[slot].1;
            for (acc, spec) in accumulators.iter_mut().zip(&specs) {
                eval(&spec.args[spec.func.value_arg()], &row, functions)
                    .and_then(|value| acc.accumulate(&value))
                    .map_err(|e| e.in_expression(spec.text, row_number))?;
            }
            row_number += 1;
        }
        self.input.close()?;

        // Aggregating without keys always yields one group
        if groups.is_empty() && self.keys.is_empty() {
            groups.push((Vec::new(), Self::new_accumulators(&specs)?));
        }

        tracing::debug!(groups = groups.len(), rows = row_number, "Aggregated input");

        for (group_number, (key, accumulators)) in groups.into_iter().enumerate() {
            let finished: Vec<Value> = accumulators.into_iter().map(Accumulator::finalize).collect();
            let mut aggregates = finished.iter();
            let mut values = Vec::with_capacity(self.outputs.len());
            for (expr, text) in &self.outputs {
                values.push(
                    eval_group(expr, &key, &mut aggregates, functions)
                        .map_err(|e| e.in_expression(text, group_number))?,
                );
            }
            if self.has_having {
                let having = values.remove(0);
                if !is_true(&having) {
                    continue;
                }
            }
            self.output.push(Row::new(values));
        }
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if self.position >= self.output.len() {
            return Ok(None);
        }
        let row = self.output[self.position].clone();
        self.position += 1;
        Ok(Some(row))
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.output.clear();
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::executor::test_util::{run, MockExecutor};
    use crate::sql::{parse, Resolver};

    fn accumulate(func: AggregateFunc, args: &[ResolvedExpr], values: &[Value]) -> Value {
        let mut acc = Accumulator::new(func, args).unwrap();
        for value in values {
            acc.accumulate(value).unwrap();
        }
        acc.finalize()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Integer(v)).collect()
    }

    fn int_literal(n: i64) -> ResolvedExpr {
        ResolvedExpr::Literal {
            value: Value::Integer(n),
            data_type: crate::catalog::DataType::Integer,
        }
    }

    #[test]
    fn test_count_and_sum_skip_nulls() {
        let values = vec![Value::Integer(10), Value::Null, Value::Integer(30)];
        assert_eq!(accumulate(AggregateFunc::Count, &[], &values), Value::Integer(2));
        assert_eq!(accumulate(AggregateFunc::Sum, &[], &values), Value::Integer(40));
        assert_eq!(accumulate(AggregateFunc::Avg, &[], &values), Value::Float(20.0));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(accumulate(AggregateFunc::Count, &[], &[]), Value::Integer(0));
        assert_eq!(accumulate(AggregateFunc::Sum, &[], &[]), Value::Null);
        assert_eq!(accumulate(AggregateFunc::Avg, &[], &[]), Value::Null);
        assert_eq!(accumulate(AggregateFunc::Max, &[], &[]), Value::Null);
        assert_eq!(accumulate(AggregateFunc::GroupConcat, &[], &[]), Value::Null);
    }

    #[test]
    fn test_sum_overflow() {
        let mut acc = Accumulator::new(AggregateFunc::Sum, &[]).unwrap();
        acc.accumulate(&Value::Integer(i64::MAX)).unwrap();
        assert!(matches!(
            acc.accumulate(&Value::Integer(1)),
            Err(ExecutorError::Overflow(_))
        ));
    }

    #[test]
    fn test_min_max_distinct() {
        let values = ints(&[3, 1, 3, 2]);
        assert_eq!(accumulate(AggregateFunc::Min, &[], &values), Value::Integer(1));
        assert_eq!(accumulate(AggregateFunc::Max, &[], &values), Value::Integer(3));
        assert_eq!(accumulate(AggregateFunc::CountDistinct, &[], &values), Value::Integer(3));
    }

    #[test]
    fn test_first_and_nth() {
        let values = ints(&[5, 6, 7]);
        assert_eq!(accumulate(AggregateFunc::First, &[], &values), Value::Integer(5));
        let args = [int_literal(2)];
        assert_eq!(accumulate(AggregateFunc::Nth, &args, &values), Value::Integer(6));
        let args = [int_literal(9)];
        assert_eq!(accumulate(AggregateFunc::Nth, &args, &values), Value::Null);
    }

    #[test]
    fn test_repeated_values_feed_elements() {
        let values = vec![Value::Array(ints(&[1, 2])), Value::Array(ints(&[3]))];
        assert_eq!(accumulate(AggregateFunc::Count, &[], &values), Value::Integer(3));
        assert_eq!(accumulate(AggregateFunc::Sum, &[], &values), Value::Integer(6));
    }

    #[test]
    fn test_group_concat_separator() {
        let values = vec![Value::from("a"), Value::Null, Value::from("b")];
        assert_eq!(
            accumulate(AggregateFunc::GroupConcat, &[], &values),
            Value::from("a,b")
        );
        let sep = ResolvedExpr::Literal {
            value: Value::from("|"),
            data_type: crate::catalog::DataType::String,
        };
        let args = [int_literal(0), sep];
        assert_eq!(
            accumulate(AggregateFunc::GroupConcat, &args, &values),
            Value::from("a|b")
        );
    }

    #[test]
    fn test_variance_and_stddev() {
        let values = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(accumulate(AggregateFunc::VarPop, &[], &values), Value::Float(4.0));
        assert_eq!(accumulate(AggregateFunc::StddevPop, &[], &values), Value::Float(2.0));
        let Value::Float(samp) = accumulate(AggregateFunc::VarSamp, &[], &values) else {
            panic!("expected float");
        };
        assert!((samp - 32.0 / 7.0).abs() < 1e-9);
        assert_eq!(accumulate(AggregateFunc::StddevSamp, &[], &ints(&[1])), Value::Null);
    }

    #[test]
    fn test_quantiles() {
        let args = [int_literal(0), int_literal(3)];
        let values = ints(&[5, 1, 4, 2, 3]);
        assert_eq!(
            accumulate(AggregateFunc::Quantiles, &args, &values),
            Value::Array(ints(&[1, 3, 5]))
        );
        let bad = [int_literal(0), int_literal(1)];
        assert!(Accumulator::new(AggregateFunc::Quantiles, &bad).is_err());
    }

    fn grouped_select(catalog: &Catalog, sql: &str) -> ResolvedSelect {
        Resolver::new(catalog).resolve_select(&parse(sql).unwrap()).unwrap()
    }

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(
                "t",
                &[
                    crate::catalog::Field::new("k", crate::catalog::DataType::String),
                    crate::catalog::Field::new("v", crate::catalog::DataType::Integer),
                ],
            )
            .unwrap();
        catalog
    }

    fn input_rows() -> Vec<Row> {
        vec![
            Row::new(vec![Value::from("b"), Value::Integer(1)]),
            Row::new(vec![Value::from("a"), Value::Integer(2)]),
            Row::new(vec![Value::from("b"), Value::Integer(3)]),
        ]
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let catalog = test_catalog();
        let ctx = QueryContext::new(&catalog);
        let select = grouped_select(&catalog, "SELECT k, SUM(v) FROM t GROUP BY k");
        let keys = select.grouping.as_deref().unwrap();
        let mut agg = HashAggregate::new(MockExecutor::boxed(input_rows()), &select, keys, &ctx);
        let rows = run(&mut agg).unwrap();
        assert_eq!(
            rows,
            vec![
                Row::new(vec![Value::from("b"), Value::Integer(4)]),
                Row::new(vec![Value::from("a"), Value::Integer(2)]),
            ]
        );
    }

    #[test]
    fn test_having_drops_groups() {
        let catalog = test_catalog();
        let ctx = QueryContext::new(&catalog);
        let select = grouped_select(&catalog, "SELECT k FROM t GROUP BY k HAVING COUNT(*) > 1");
        let keys = select.grouping.as_deref().unwrap();
        let mut agg = HashAggregate::new(MockExecutor::boxed(input_rows()), &select, keys, &ctx);
        assert_eq!(run(&mut agg).unwrap(), vec![Row::new(vec![Value::from("b")])]);
    }

    #[test]
    fn test_implicit_group_over_empty_input() {
        let catalog = test_catalog();
        let ctx = QueryContext::new(&catalog);
        let select = grouped_select(&catalog, "SELECT COUNT(*), SUM(v) FROM t");
        let keys = select.grouping.as_deref().unwrap();
        let mut agg = HashAggregate::new(MockExecutor::boxed(vec![]), &select, keys, &ctx);
        assert_eq!(
            run(&mut agg).unwrap(),
            vec![Row::new(vec![Value::Integer(0), Value::Null])]
        );

        let select = grouped_select(&catalog, "SELECT k, COUNT(*) FROM t GROUP BY k");
        let keys = select.grouping.as_deref().unwrap();
        let mut agg = HashAggregate::new(MockExecutor::boxed(vec![]), &select, keys, &ctx);
        assert!(run(&mut agg).unwrap().is_empty());
    }
}
