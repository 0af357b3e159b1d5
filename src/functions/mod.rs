//! SQL function and operator library
//!
//! Every operator and named function resolves through the registry in this
//! module. A scalar function carries its signature (arity and which arguments
//! must be literals), a type rule checked at resolution time, and an
//! evaluation rule applied per row. Aggregates are a closed enum whose
//! accumulators live in the executor.

mod aggregate;
mod conditional;
mod math;
mod operators;
mod string;
mod time;

pub use aggregate::AggregateFunc;
pub(crate) use operators::compare_values;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::catalog::{DataType, Mode, Value};
use crate::config::EngineConfig;
use crate::executor::{ExecutorError, ExecutorResult};
use crate::sql::ast::{BinaryOp, UnaryOp};

/// Metadata about a function's signature
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Function name as shown in errors
    pub name: &'static str,
    /// Minimum argument count
    pub min_args: usize,
    /// Maximum argument count (None = variadic)
    pub max_args: Option<usize>,
    /// Positions of arguments that must be literals
    pub literal_args: &'static [usize],
}

impl FunctionSignature {
    /// Check whether `count` arguments are accepted
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human-readable expected argument count
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Per-query evaluation state shared by every function call
pub struct FunctionContext {
    now_micros: i64,
    rng: RefCell<StdRng>,
    /// Regular expressions compiled so far in this query, keyed by pattern
    patterns: RefCell<HashMap<String, Regex>>,
}

impl FunctionContext {
    /// Create the context for one query: pin the clock and seed RAND()
    pub fn new(config: &EngineConfig) -> Self {
        let now_micros = config
            .fixed_now
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        Self {
            now_micros,
            rng: RefCell::new(StdRng::seed_from_u64(config.rand_seed)),
            patterns: RefCell::new(HashMap::new()),
        }
    }

    /// Query start time in microseconds since the epoch
    pub fn now_micros(&self) -> i64 {
        self.now_micros
    }

    /// Next value in [0, 1) from the query's random stream
    pub fn next_random(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }

    /// Compiled form of a regex pattern, built on first use within the query
    pub fn regex(&self, name: &str, pattern: &str) -> ExecutorResult<Regex> {
        if let Some(re) = self.patterns.borrow().get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| {
            ExecutorError::function(name, format!("invalid regular expression: {}", e))
        })?;
        self.patterns
            .borrow_mut()
            .insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    #[cfg(test)]
    fn compiled_patterns(&self) -> usize {
        self.patterns.borrow().len()
    }
}

impl fmt::Debug for FunctionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionContext")
            .field("now_micros", &self.now_micros)
            .field("patterns", &self.patterns.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Trait for scalar functions and operators
pub trait ScalarFunction: Send + Sync + fmt::Debug {
    /// Get the function's signature
    fn signature(&self) -> &FunctionSignature;

    /// Validate argument types and return the result type
    fn check_types(&self, args: &[DataType]) -> Result<DataType, String>;

    /// Whether a NULL argument short-circuits the call to NULL
    fn propagates_null(&self) -> bool {
        true
    }

    /// Result mode for the given argument modes
    fn result_mode(&self, args: &[Mode]) -> Mode {
        inherit_mode(args)
    }

    /// Evaluate on one row's argument values
    fn evaluate(&self, args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value>;
}

/// Any REPEATED argument makes the result REPEATED; all REQUIRED stays REQUIRED
pub fn inherit_mode(args: &[Mode]) -> Mode {
    if args.contains(&Mode::Repeated) {
        Mode::Repeated
    } else if args.iter().all(|m| *m == Mode::Required) {
        Mode::Required
    } else {
        Mode::Nullable
    }
}

/// Type rule: argument types to result type
pub type TypeRule = fn(&[DataType]) -> Result<DataType, String>;

/// Evaluation rule: argument values to result value
pub type EvalRule = fn(&[Value], &FunctionContext) -> ExecutorResult<Value>;

/// How the result mode is derived from argument modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeRule {
    Inherit,
    /// May produce NULL from non-NULL input
    Nullable,
    /// Never produces NULL
    Required,
}

/// Table-driven scalar function
#[derive(Debug)]
pub struct Builtin {
    signature: FunctionSignature,
    check: TypeRule,
    eval: EvalRule,
    propagates_null: bool,
    mode: ModeRule,
}

impl Builtin {
    /// Fixed- or bounded-arity function
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        check: TypeRule,
        eval: EvalRule,
    ) -> Self {
        Self {
            signature: FunctionSignature {
                name,
                min_args,
                max_args,
                literal_args: &[],
            },
            check,
            eval,
            propagates_null: true,
            mode: ModeRule::Inherit,
        }
    }

    /// Function taking exactly `n` arguments
    pub fn exact(name: &'static str, n: usize, check: TypeRule, eval: EvalRule) -> Self {
        Self::new(name, n, Some(n), check, eval)
    }

    /// Require literal arguments at these positions
    #[must_use]
    pub fn literal_args(mut self, positions: &'static [usize]) -> Self {
        self.signature.literal_args = positions;
        self
    }

    /// Receive NULL arguments instead of short-circuiting
    #[must_use]
    pub fn handles_null(mut self) -> Self {
        self.propagates_null = false;
        self
    }

    /// Result may be NULL even for non-NULL input
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.mode = ModeRule::Nullable;
        self
    }

    /// Result is never NULL
    #[must_use]
    pub fn required(mut self) -> Self {
        self.mode = ModeRule::Required;
        self
    }
}

impl ScalarFunction for Builtin {
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn check_types(&self, args: &[DataType]) -> Result<DataType, String> {
        (self.check)(args)
    }

    fn propagates_null(&self) -> bool {
        self.propagates_null
    }

    fn result_mode(&self, args: &[Mode]) -> Mode {
        match (inherit_mode(args), self.mode) {
            (Mode::Repeated, _) => Mode::Repeated,
            (_, ModeRule::Required) => Mode::Required,
            (_, ModeRule::Nullable) => Mode::Nullable,
            (mode, ModeRule::Inherit) => mode,
        }
    }

    fn evaluate(&self, args: &[Value], ctx: &FunctionContext) -> ExecutorResult<Value> {
        (self.eval)(args, ctx)
    }
}

// ============ Shared type rules ============

/// NULL literals fit any argument slot
pub(crate) fn is_type(actual: DataType, expected: DataType) -> bool {
    actual == expected || actual == DataType::Null
}

pub(crate) fn is_numeric(t: DataType) -> bool {
    t.is_numeric() || t == DataType::Null
}

/// FLOAT if any argument is FLOAT, else INTEGER; every argument must be numeric
pub(crate) fn numeric_result(args: &[DataType]) -> Result<DataType, String> {
    if let Some(bad) = args.iter().find(|t| !is_numeric(**t)) {
        return Err(format!("expected numeric arguments, got {}", bad));
    }
    if args.contains(&DataType::Float) {
        Ok(DataType::Float)
    } else {
        Ok(DataType::Integer)
    }
}

/// Every argument must be `expected`
pub(crate) fn all_of(args: &[DataType], expected: DataType) -> Result<(), String> {
    match args.iter().find(|t| !is_type(**t, expected)) {
        Some(bad) => Err(format!("expected {} arguments, got {}", expected, bad)),
        None => Ok(()),
    }
}

/// Common type of values that must agree (NULL adopts the other side)
pub(crate) fn unify(args: &[DataType]) -> Result<DataType, String> {
    let mut result = DataType::Null;
    for t in args {
        result = match (result, *t) {
            (DataType::Null, t) | (t, DataType::Null) => t,
            (a, b) if a == b => a,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            (a, b) => return Err(format!("incompatible types {} and {}", a, b)),
        };
    }
    Ok(result)
}

// ============ Shared value helpers ============

pub(crate) fn int_arg(name: &str, v: &Value) -> ExecutorResult<i64> {
    v.as_int()
        .ok_or_else(|| ExecutorError::function(name, format!("expected INTEGER, got {}", v)))
}

pub(crate) fn float_arg(name: &str, v: &Value) -> ExecutorResult<f64> {
    v.as_float()
        .ok_or_else(|| ExecutorError::function(name, format!("expected number, got {}", v)))
}

pub(crate) fn str_arg<'a>(name: &str, v: &'a Value) -> ExecutorResult<&'a str> {
    v.as_str()
        .ok_or_else(|| ExecutorError::function(name, format!("expected STRING, got {}", v)))
}

pub(crate) fn bool_arg(name: &str, v: &Value) -> ExecutorResult<bool> {
    v.as_bool()
        .ok_or_else(|| ExecutorError::function(name, format!("expected BOOLEAN, got {}", v)))
}

// ============ Registry ============

/// A resolved function name
#[derive(Debug, Clone, Copy)]
pub enum FunctionRef {
    Scalar(&'static dyn ScalarFunction),
    Aggregate(AggregateFunc),
}

/// Registry of all available SQL functions and operators
pub struct FunctionRegistry {
    scalars: HashMap<&'static str, Box<dyn ScalarFunction>>,
    aggregates: HashMap<&'static str, AggregateFunc>,
    binary: HashMap<BinaryOp, Box<dyn ScalarFunction>>,
    unary: HashMap<UnaryOp, Box<dyn ScalarFunction>>,
}

impl FunctionRegistry {
    fn new() -> Self {
        let mut registry = Self {
            scalars: HashMap::new(),
            aggregates: HashMap::new(),
            binary: HashMap::new(),
            unary: HashMap::new(),
        };

        operators::register(&mut registry);
        math::register(&mut registry);
        string::register(&mut registry);
        conditional::register(&mut registry);
        time::register(&mut registry);
        aggregate::register(&mut registry);

        registry
    }

    /// Register a named scalar function
    pub(crate) fn scalar(&mut self, function: Builtin) {
        self.scalars.insert(function.signature.name, Box::new(function));
    }

    /// Register a named scalar function under an extra name
    pub(crate) fn alias(&mut self, alias: &'static str, function: Builtin) {
        self.scalars.insert(alias, Box::new(function));
    }

    pub(crate) fn aggregate(&mut self, name: &'static str, function: AggregateFunc) {
        self.aggregates.insert(name, function);
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, function: Builtin) {
        self.binary.insert(op, Box::new(function));
    }

    pub(crate) fn unary(&mut self, op: UnaryOp, function: Builtin) {
        self.unary.insert(op, Box::new(function));
    }
}

static REGISTRY: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::new);

/// Look up a function by (case-insensitive) name
pub fn get_function(name: &str) -> Option<FunctionRef> {
    let name = name.to_ascii_lowercase();
    let registry: &'static FunctionRegistry = &REGISTRY;
    if let Some(f) = registry.scalars.get(name.as_str()) {
        return Some(FunctionRef::Scalar(f.as_ref()));
    }
    registry
        .aggregates
        .get(name.as_str())
        .map(|a| FunctionRef::Aggregate(*a))
}

/// Look up the implementation of a binary operator
pub fn get_binary_operator(op: BinaryOp) -> Option<&'static dyn ScalarFunction> {
    let registry: &'static FunctionRegistry = &REGISTRY;
    registry.binary.get(&op).map(|f| f.as_ref())
}

/// Look up the implementation of a unary operator
pub fn get_unary_operator(op: UnaryOp) -> Option<&'static dyn ScalarFunction> {
    let registry: &'static FunctionRegistry = &REGISTRY;
    registry.unary.get(&op).map(|f| f.as_ref())
}

/// Check if a name refers to an aggregate function
pub fn is_aggregate(name: &str) -> bool {
    matches!(get_function(name), Some(FunctionRef::Aggregate(_)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ctx() -> FunctionContext {
        FunctionContext::new(&EngineConfig::default().with_fixed_now(0))
    }

    pub(crate) fn call(name: &str, args: &[Value]) -> ExecutorResult<Value> {
        match get_function(name) {
            Some(FunctionRef::Scalar(f)) => f.evaluate(args, &ctx()),
            _ => panic!("no scalar function {}", name),
        }
    }

    pub(crate) fn check(name: &str, args: &[DataType]) -> Result<DataType, String> {
        match get_function(name) {
            Some(FunctionRef::Scalar(f)) => f.check_types(args),
            _ => panic!("no scalar function {}", name),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(matches!(get_function("ABS"), Some(FunctionRef::Scalar(_))));
        assert!(matches!(get_function("Sum"), Some(FunctionRef::Aggregate(_))));
        assert!(get_function("no_such_fn").is_none());
        assert!(is_aggregate("count"));
        assert!(!is_aggregate("concat"));
    }

    #[test]
    fn test_every_operator_registered() {
        for op in [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
            BinaryOp::Eq,
            BinaryOp::NotEq,
            BinaryOp::Lt,
            BinaryOp::LtEq,
            BinaryOp::Gt,
            BinaryOp::GtEq,
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Contains,
        ] {
            assert!(get_binary_operator(op).is_some(), "{:?}", op);
        }
        for op in [UnaryOp::Not, UnaryOp::Neg, UnaryOp::IsNull, UnaryOp::IsNotNull] {
            assert!(get_unary_operator(op).is_some(), "{:?}", op);
        }
    }

    #[test]
    fn test_signature_arity() {
        let sig = FunctionSignature {
            name: "f",
            min_args: 1,
            max_args: Some(2),
            literal_args: &[],
        };
        assert!(sig.accepts(1));
        assert!(sig.accepts(2));
        assert!(!sig.accepts(3));
        assert_eq!(sig.arity(), "1 to 2");
    }

    #[test]
    fn test_rand_is_seeded_per_context() {
        let a = ctx();
        let b = ctx();
        assert_eq!(a.next_random().to_bits(), b.next_random().to_bits());
    }

    #[test]
    fn test_inherit_mode() {
        assert_eq!(inherit_mode(&[Mode::Required, Mode::Required]), Mode::Required);
        assert_eq!(inherit_mode(&[Mode::Required, Mode::Nullable]), Mode::Nullable);
        assert_eq!(inherit_mode(&[Mode::Nullable, Mode::Repeated]), Mode::Repeated);
        assert_eq!(inherit_mode(&[]), Mode::Required);
    }
}
