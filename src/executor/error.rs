//! Executor error types

use std::fmt;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// Integer or float division (or modulo) by zero
    DivisionByZero,

    /// Integer arithmetic overflow
    Overflow(String),

    /// Value could not be converted to the requested type
    BadCast(String),

    /// Built-in function rejected its input at runtime
    Function { name: String, message: String },

    /// Configured resource bound exceeded
    ResourceLimit(String),

    /// Column index out of bounds
    ColumnIndexOutOfBounds { index: usize, row_len: usize },

    /// Table referenced by a plan disappeared from the catalog
    TableNotFound(String),

    /// Failure while evaluating a named expression on a given row
    InExpression {
        expr: String,
        row: usize,
        source: Box<ExecutorError>,
    },

    /// Internal executor error
    Internal(String),
}

impl ExecutorError {
    /// Runtime error raised by a named function
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        ExecutorError::Function {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Attach expression text and row index, unless already attached
    pub fn in_expression(self, expr: &str, row: usize) -> Self {
        match self {
            ExecutorError::InExpression { .. } => self,
            other => ExecutorError::InExpression {
                expr: expr.to_string(),
                row,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping expression context
    pub fn root(&self) -> &ExecutorError {
        match self {
            ExecutorError::InExpression { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::DivisionByZero => write!(f, "division by zero"),
            ExecutorError::Overflow(op) => write!(f, "integer overflow in {}", op),
            ExecutorError::BadCast(msg) => write!(f, "bad cast: {}", msg),
            ExecutorError::Function { name, message } => {
                write!(f, "{}: {}", name.to_uppercase(), message)
            }
            ExecutorError::ResourceLimit(msg) => write!(f, "resource limit exceeded: {}", msg),
            ExecutorError::ColumnIndexOutOfBounds { index, row_len } => {
                write!(f, "column index {} out of bounds (row has {} columns)", index, row_len)
            }
            ExecutorError::TableNotFound(name) => write!(f, "table not found: {}", name),
            ExecutorError::InExpression { expr, row, source } => {
                write!(f, "error evaluating '{}' at row {}: {}", expr, row, source)
            }
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::InExpression { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
