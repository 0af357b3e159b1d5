//! SQL error types

use std::fmt;

/// Malformed query text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong
    pub message: String,
    /// Character offset into the query text
    pub position: usize,
}

impl ParseError {
    /// Create a parse error at a position
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Result type for parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Resolution (compile-time) error types
///
/// Every variant names the offending query fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// Column name matches nothing in scope
    UnknownColumn(String),
    /// Column name matches more than one column in scope
    AmbiguousColumn { name: String, candidates: Vec<String> },
    /// Argument types do not fit the function or operator
    TypeMismatch { expr: String, message: String },
    /// Bare column in a grouped select that is not a grouping key
    NotGrouped(String),
    /// Function name not in the library
    UnknownFunction(String),
    /// Wrong argument count for a function
    BadArity {
        function: String,
        expected: String,
        found: usize,
    },
    /// Table or view not in the catalog
    UnknownTable(String),
    /// Two explicit aliases with the same name
    DuplicateAlias(String),
    /// Bad GROUP BY item
    InvalidGroupBy(String),
    /// Bad join condition or join shape
    InvalidJoin(String),
    /// Aggregate used where aggregation is not allowed
    AggregateNotAllowed { expr: String, clause: &'static str },
    /// A view whose query cannot be resolved
    InvalidView { name: String, reason: String },
    /// Unsupported SQL feature
    Unsupported(String),
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlError::UnknownColumn(name) => write!(f, "Column '{}' not found", name),
            SqlError::AmbiguousColumn { name, candidates } => write!(
                f,
                "Column '{}' is ambiguous (matches {})",
                name,
                candidates.join(", ")
            ),
            SqlError::TypeMismatch { expr, message } => {
                write!(f, "Type mismatch in '{}': {}", expr, message)
            }
            SqlError::NotGrouped(expr) => write!(
                f,
                "Expression '{}' is neither grouped nor aggregated",
                expr
            ),
            SqlError::UnknownFunction(name) => write!(f, "Unknown function '{}'", name),
            SqlError::BadArity {
                function,
                expected,
                found,
            } => write!(
                f,
                "Function '{}' expects {} arguments, got {}",
                function, expected, found
            ),
            SqlError::UnknownTable(name) => write!(f, "Table '{}' not found", name),
            SqlError::DuplicateAlias(name) => write!(f, "Duplicate alias '{}'", name),
            SqlError::InvalidGroupBy(msg) => write!(f, "Invalid GROUP BY: {}", msg),
            SqlError::InvalidJoin(msg) => write!(f, "Invalid join: {}", msg),
            SqlError::AggregateNotAllowed { expr, clause } => {
                write!(f, "Aggregate '{}' is not allowed in {}", expr, clause)
            }
            SqlError::InvalidView { name, reason } => {
                write!(f, "View '{}' is invalid: {}", name, reason)
            }
            SqlError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
        }
    }
}

impl std::error::Error for SqlError {}

/// Result type for SQL resolution
pub type SqlResult<T> = Result<T, SqlError>;
