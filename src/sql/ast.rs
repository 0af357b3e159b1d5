//! Internal AST types
//!
//! The untyped tree is what the parser produces. The resolved tree is what
//! the resolver produces from it: every column reference bound to a position
//! in the FROM row, every call bound to a library function, and every node
//! annotated with its result type and mode.

use std::fmt;

use crate::catalog::{DataType, Mode, Schema, Value};
use crate::functions::{AggregateFunc, ScalarFunction};

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Runtime value of this literal
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    /// Static type of this literal
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Null => DataType::Null,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::Integer(_) => DataType::Integer,
            Literal::Float(_) => DataType::Float,
            Literal::String(_) => DataType::String,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
    // String
    Contains,
}

impl BinaryOp {
    /// Operator as written in SQL
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Contains => "CONTAINS",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// Expression (before resolution)
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference as written, possibly dotted (`t.a`, `rec.field`)
    Column(String),
    /// Literal value
    Literal(Literal),
    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// Function call; name is lowercase
    Function { name: String, args: Vec<Expr> },
    /// expr [NOT] IN (list)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// expr [NOT] BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// CASE [operand] WHEN .. THEN .. [ELSE ..] END
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Shorthand for a binary node
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Shorthand for a unary node
    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Neg => write!(f, "-{}", expr),
                UnaryOp::IsNull => write!(f, "{} IS NULL", expr),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", expr),
            },
            Expr::Function { name, args } => {
                write!(f, "{}(", name.to_uppercase())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {}", else_result)?;
                }
                write!(f, " END")
            }
        }
    }
}

/// SELECT item (column in SELECT list)
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Expression with optional alias
    Expr { expr: Expr, alias: Option<String> },
    /// Wildcard (*)
    Wildcard,
    /// Qualified wildcard (table.*)
    QualifiedWildcard(String),
}

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    Cross,
}

/// Source in a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    /// Named table or view
    Table { name: String, alias: Option<String> },
    /// Parenthesized subquery
    Subquery {
        query: Box<SelectStatement>,
        alias: Option<String>,
    },
    /// Two sources combined; comma lists become left-deep CROSS joins
    Join {
        left: Box<TableExpr>,
        right: Box<TableExpr>,
        join_type: JoinType,
        condition: Option<Expr>,
    },
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub ascending: bool,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Option<TableExpr>,
    pub filter: Option<Expr>,
    /// Grouping items; integer literals are 1-based select-list ordinals
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

// ============ Resolved types (after name resolution) ============

/// Resolved column reference with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    /// Qualifier the column is visible under, if any
    pub table: Option<String>,
    pub name: String,
    /// Position in the FROM row
    pub index: usize,
    pub data_type: DataType,
    pub mode: Mode,
}

/// Resolved expression with type information
#[derive(Debug, Clone)]
pub enum ResolvedExpr {
    /// Value from the FROM row
    Column(ResolvedColumn),
    /// Constant
    Literal { value: Value, data_type: DataType },
    /// Scalar function or operator application
    Call {
        function: &'static dyn ScalarFunction,
        args: Vec<ResolvedExpr>,
        data_type: DataType,
        mode: Mode,
    },
    /// Aggregate over the rows of a group
    Aggregate {
        function: AggregateFunc,
        args: Vec<ResolvedExpr>,
        data_type: DataType,
        mode: Mode,
    },
    /// Value of the `index`th grouping key for the current group
    GroupKey {
        index: usize,
        data_type: DataType,
        mode: Mode,
    },
}

impl ResolvedExpr {
    /// Get the data type of this expression
    pub fn data_type(&self) -> DataType {
        match self {
            ResolvedExpr::Column(col) => col.data_type,
            ResolvedExpr::Literal { data_type, .. }
            | ResolvedExpr::Call { data_type, .. }
            | ResolvedExpr::Aggregate { data_type, .. }
            | ResolvedExpr::GroupKey { data_type, .. } => *data_type,
        }
    }

    /// Get the mode of this expression
    pub fn mode(&self) -> Mode {
        match self {
            ResolvedExpr::Column(col) => col.mode,
            ResolvedExpr::Literal { value, .. } => {
                if value.is_null() {
                    Mode::Nullable
                } else {
                    Mode::Required
                }
            }
            ResolvedExpr::Call { mode, .. }
            | ResolvedExpr::Aggregate { mode, .. }
            | ResolvedExpr::GroupKey { mode, .. } => *mode,
        }
    }

    /// Check whether an aggregate appears anywhere in this expression
    pub fn contains_aggregate(&self) -> bool {
        match self {
            ResolvedExpr::Aggregate { .. } => true,
            ResolvedExpr::Call { args, .. } => args.iter().any(|a| a.contains_aggregate()),
            _ => false,
        }
    }
}

/// An expression with the query text it came from, for error messages
#[derive(Debug, Clone)]
pub struct LabeledExpr {
    pub expr: ResolvedExpr,
    pub text: String,
}

/// Resolved SELECT item; wildcards are already expanded
#[derive(Debug, Clone)]
pub struct ResolvedSelectItem {
    pub expr: ResolvedExpr,
    /// Output column name
    pub name: String,
    pub text: String,
}

/// Resolved ORDER BY item
#[derive(Debug, Clone)]
pub struct ResolvedOrderByItem {
    pub expr: LabeledExpr,
    pub ascending: bool,
}

/// Resolved FROM source; its rows are the concatenation of its columns
#[derive(Debug, Clone)]
pub enum ResolvedTableExpr {
    /// Stored table read from the catalog
    Table { name: String, schema: Schema },
    /// Subquery or view, evaluated first
    Subquery(Box<ResolvedSelect>),
    /// Nested-loop join of two sources
    Join {
        left: Box<ResolvedTableExpr>,
        right: Box<ResolvedTableExpr>,
        join_type: JoinType,
        condition: Option<LabeledExpr>,
        /// Number of left-side columns; right values start here
        left_width: usize,
        /// Number of right-side columns; unmatched LEFT OUTER rows pad this many NULLs
        right_width: usize,
    },
}

impl ResolvedTableExpr {
    /// Number of columns this source contributes to the FROM row
    pub fn width(&self) -> usize {
        match self {
            ResolvedTableExpr::Table { schema, .. } => schema.len(),
            ResolvedTableExpr::Subquery(select) => select.schema.len(),
            ResolvedTableExpr::Join {
                left_width,
                right_width,
                ..
            } => left_width + right_width,
        }
    }
}

/// Resolved SELECT statement
#[derive(Debug, Clone)]
pub struct ResolvedSelect {
    pub distinct: bool,
    pub columns: Vec<ResolvedSelectItem>,
    pub from: Option<ResolvedTableExpr>,
    pub filter: Option<LabeledExpr>,
    /// Grouping keys; `Some(empty)` is a single implicit group
    pub grouping: Option<Vec<LabeledExpr>>,
    pub having: Option<LabeledExpr>,
    pub order_by: Vec<ResolvedOrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Output schema, one column per select item
    pub schema: Schema,
}
