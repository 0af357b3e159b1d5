//! SQL layer - parsing, resolution, and type checking
//!
//! This module provides:
//! - `Lexer`/`Parser`: Turns query text into the untyped AST
//! - `Resolver`: Resolves names against the catalog
//! - `TypeChecker`: Validates predicates and grouping

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod typecheck;

pub use ast::*;
pub use error::{ParseError, ParseResult, SqlError, SqlResult};
pub use lexer::{tokenize, Lexer, Token};
pub use parser::{parse, Parser};
pub use resolver::Resolver;
pub use typecheck::TypeChecker;
