//! Aggregate function definitions
//!
//! Only signatures and type rules live here; the per-group accumulators are
//! in `executor::aggregate`.

use super::{is_numeric, is_type, FunctionRegistry, FunctionSignature};
use crate::catalog::{DataType, Mode};

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    First,
    /// NTH(n, expr): the n-th value (1-based) in input order
    Nth,
    /// GROUP_CONCAT_UNQUOTED(expr[, separator])
    GroupConcat,
    StddevSamp,
    StddevPop,
    VarSamp,
    VarPop,
    /// QUANTILES(expr, n): n approximate quantile boundaries
    Quantiles,
}

const fn signature(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    literal_args: &'static [usize],
) -> FunctionSignature {
    FunctionSignature {
        name,
        min_args,
        max_args: Some(max_args),
        literal_args,
    }
}

static COUNT: FunctionSignature = signature("count", 1, 1, &[]);
static COUNT_DISTINCT: FunctionSignature = signature("count_distinct", 1, 1, &[]);
static SUM: FunctionSignature = signature("sum", 1, 1, &[]);
static AVG: FunctionSignature = signature("avg", 1, 1, &[]);
static MIN: FunctionSignature = signature("min", 1, 1, &[]);
static MAX: FunctionSignature = signature("max", 1, 1, &[]);
static FIRST: FunctionSignature = signature("first", 1, 1, &[]);
static NTH: FunctionSignature = signature("nth", 2, 2, &[0]);
static GROUP_CONCAT: FunctionSignature = signature("group_concat_unquoted", 1, 2, &[1]);
static STDDEV_SAMP: FunctionSignature = signature("stddev_samp", 1, 1, &[]);
static STDDEV_POP: FunctionSignature = signature("stddev_pop", 1, 1, &[]);
static VAR_SAMP: FunctionSignature = signature("var_samp", 1, 1, &[]);
static VAR_POP: FunctionSignature = signature("var_pop", 1, 1, &[]);
static QUANTILES: FunctionSignature = signature("quantiles", 2, 2, &[1]);

impl AggregateFunc {
    pub fn signature(&self) -> &'static FunctionSignature {
        match self {
            AggregateFunc::Count => &COUNT,
            AggregateFunc::CountDistinct => &COUNT_DISTINCT,
            AggregateFunc::Sum => &SUM,
            AggregateFunc::Avg => &AVG,
            AggregateFunc::Min => &MIN,
            AggregateFunc::Max => &MAX,
            AggregateFunc::First => &FIRST,
            AggregateFunc::Nth => &NTH,
            AggregateFunc::GroupConcat => &GROUP_CONCAT,
            AggregateFunc::StddevSamp => &STDDEV_SAMP,
            AggregateFunc::StddevPop => &STDDEV_POP,
            AggregateFunc::VarSamp => &VAR_SAMP,
            AggregateFunc::VarPop => &VAR_POP,
            AggregateFunc::Quantiles => &QUANTILES,
        }
    }

    pub fn name(&self) -> &'static str {
        self.signature().name
    }

    /// Index of the argument whose values are accumulated
    pub fn value_arg(&self) -> usize {
        match self {
            AggregateFunc::Nth => 1,
            _ => 0,
        }
    }

    /// Validate argument types and return the result type
    pub fn check_types(&self, args: &[DataType]) -> Result<DataType, String> {
        let value = args[self.value_arg()];
        if value == DataType::Record {
            return Err("cannot aggregate a record".to_string());
        }
        match self {
            AggregateFunc::Count | AggregateFunc::CountDistinct => Ok(DataType::Integer),
            AggregateFunc::Sum => match value {
                DataType::Integer | DataType::Null => Ok(DataType::Integer),
                DataType::Float => Ok(DataType::Float),
                other => Err(format!("SUM expects a number, got {}", other)),
            },
            AggregateFunc::Avg
            | AggregateFunc::StddevSamp
            | AggregateFunc::StddevPop
            | AggregateFunc::VarSamp
            | AggregateFunc::VarPop => {
                if is_numeric(value) {
                    Ok(DataType::Float)
                } else {
                    Err(format!("{} expects a number, got {}", self.name().to_uppercase(), value))
                }
            }
            AggregateFunc::Min | AggregateFunc::Max | AggregateFunc::First => Ok(value),
            AggregateFunc::Nth => {
                if is_type(args[0], DataType::Integer) {
                    Ok(value)
                } else {
                    Err(format!("NTH position must be INTEGER, got {}", args[0]))
                }
            }
            AggregateFunc::GroupConcat => {
                if !is_type(value, DataType::String) {
                    return Err(format!("GROUP_CONCAT expects STRING, got {}", value));
                }
                match args.get(1) {
                    Some(sep) if !is_type(*sep, DataType::String) => {
                        Err(format!("separator must be STRING, got {}", sep))
                    }
                    _ => Ok(DataType::String),
                }
            }
            AggregateFunc::Quantiles => {
                if is_type(args[1], DataType::Integer) {
                    Ok(value)
                } else {
                    Err(format!("QUANTILES bucket count must be INTEGER, got {}", args[1]))
                }
            }
        }
    }

    pub fn result_mode(&self) -> Mode {
        match self {
            AggregateFunc::Count | AggregateFunc::CountDistinct => Mode::Required,
            AggregateFunc::Quantiles => Mode::Repeated,
            _ => Mode::Nullable,
        }
    }
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.aggregate("count", AggregateFunc::Count);
    registry.aggregate("count_distinct", AggregateFunc::CountDistinct);
    registry.aggregate("sum", AggregateFunc::Sum);
    registry.aggregate("avg", AggregateFunc::Avg);
    registry.aggregate("min", AggregateFunc::Min);
    registry.aggregate("max", AggregateFunc::Max);
    registry.aggregate("first", AggregateFunc::First);
    registry.aggregate("nth", AggregateFunc::Nth);
    registry.aggregate("group_concat_unquoted", AggregateFunc::GroupConcat);
    registry.aggregate("group_concat", AggregateFunc::GroupConcat);
    registry.aggregate("stddev_samp", AggregateFunc::StddevSamp);
    registry.aggregate("stddev", AggregateFunc::StddevSamp);
    registry.aggregate("stddev_pop", AggregateFunc::StddevPop);
    registry.aggregate("var_samp", AggregateFunc::VarSamp);
    registry.aggregate("variance", AggregateFunc::VarSamp);
    registry.aggregate("var_pop", AggregateFunc::VarPop);
    registry.aggregate("quantiles", AggregateFunc::Quantiles);
}
