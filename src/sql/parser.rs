//! Recursive-descent SQL parser
//!
//! Produces a [`SelectStatement`] from query text. Binary operators are
//! parsed by precedence level, lowest first: OR, AND, NOT, comparisons
//! (including IS, IN, BETWEEN, CONTAINS), additive, multiplicative, unary
//! minus.

use super::ast::*;
use super::error::{ParseError, ParseResult};
use super::lexer::{tokenize, Keyword, Spanned, Token};

/// SQL parser over a token stream
pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    /// Create a parser from tokens (must end with `Eof`)
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Parse a complete query
    pub fn parse_sql(input: &str) -> ParseResult<SelectStatement> {
        let mut parser = Parser::new(tokenize(input)?);
        let select = parser.parse_select()?;
        parser.try_consume(&Token::Semicolon);
        if !matches!(parser.peek(), Token::Eof) {
            return Err(parser.unexpected("end of query"));
        }
        Ok(select)
    }

    // ============ Statement ============

    fn parse_select(&mut self) -> ParseResult<SelectStatement> {
        self.expect_keyword(Keyword::Select)?;
        let mut select = SelectStatement {
            distinct: self.try_consume_keyword(Keyword::Distinct),
            ..Default::default()
        };

        select.columns = self.parse_select_list()?;

        if self.try_consume_keyword(Keyword::From) {
            select.from = Some(self.parse_table_expr()?);
        }

        if self.try_consume_keyword(Keyword::Where) {
            select.filter = Some(self.parse_expr()?);
        }

        if self.try_consume_keyword(Keyword::Group) {
            self.try_consume_keyword(Keyword::Each);
            self.expect_keyword(Keyword::By)?;
            select.group_by = self.parse_expr_list(&[Token::Keyword(Keyword::Having)])?;
        }

        if self.try_consume_keyword(Keyword::Having) {
            select.having = Some(self.parse_expr()?);
        }

        if self.try_consume_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            select.order_by = self.parse_order_by_list()?;
        }

        if self.try_consume_keyword(Keyword::Limit) {
            select.limit = Some(self.parse_count("LIMIT")?);
            if self.try_consume_keyword(Keyword::Offset) {
                select.offset = Some(self.parse_count("OFFSET")?);
            }
        }

        Ok(select)
    }

    fn parse_count(&mut self, clause: &str) -> ParseResult<u64> {
        match self.peek().clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected(&format!("non-negative integer after {}", clause))),
        }
    }

    // ============ SELECT list ============

    fn parse_select_list(&mut self) -> ParseResult<Vec<SelectItem>> {
        let mut items = vec![self.parse_select_item()?];
        while self.try_consume(&Token::Comma) {
            if self.at_clause_end() {
                break;
            }
            items.push(self.parse_select_item()?);
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> ParseResult<SelectItem> {
        if self.try_consume(&Token::Star) {
            return Ok(SelectItem::Wildcard);
        }

        if let Some(qualifier) = self.try_qualified_wildcard() {
            return Ok(SelectItem::QualifiedWildcard(qualifier));
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    /// `name.*`, restoring the position when the item is something else
    fn try_qualified_wildcard(&mut self) -> Option<String> {
        let start = self.position;
        if let Token::Identifier(first) = self.peek().clone() {
            self.advance();
            let mut parts = vec![first];
            while self.peek() == &Token::Dot {
                match self.peek_ahead(1).clone() {
                    Token::Identifier(next) => {
                        self.advance();
                        self.advance();
                        parts.push(next);
                    }
                    Token::Star => {
                        self.advance();
                        self.advance();
                        return Some(parts.join("."));
                    }
                    _ => break,
                }
            }
        }
        self.position = start;
        None
    }

    fn parse_optional_alias(&mut self) -> ParseResult<Option<String>> {
        if self.try_consume_keyword(Keyword::As) {
            return self.parse_identifier().map(Some);
        }
        if let Token::Identifier(name) = self.peek().clone() {
            self.advance();
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn parse_order_by_list(&mut self) -> ParseResult<Vec<OrderByItem>> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let ascending = if self.try_consume_keyword(Keyword::Desc) {
                false
            } else {
                self.try_consume_keyword(Keyword::Asc);
                true
            };
            items.push(OrderByItem { expr, ascending });
            if !self.try_consume(&Token::Comma) || self.at_clause_end() {
                break;
            }
        }
        Ok(items)
    }

    /// Comma-separated expressions, tolerating a trailing comma
    fn parse_expr_list(&mut self, terminators: &[Token]) -> ParseResult<Vec<Expr>> {
        let mut items = vec![self.parse_expr()?];
        while self.try_consume(&Token::Comma) {
            if self.at_clause_end() || terminators.contains(self.peek()) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(items)
    }

    /// Whether the next token ends the current clause (used for trailing commas)
    fn at_clause_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Eof
                | Token::RParen
                | Token::Semicolon
                | Token::Keyword(
                    Keyword::From
                        | Keyword::Where
                        | Keyword::Group
                        | Keyword::Having
                        | Keyword::Order
                        | Keyword::Limit
                        | Keyword::Join
                        | Keyword::Inner
                        | Keyword::Left
                        | Keyword::Cross
                        | Keyword::On
                )
        )
    }

    // ============ FROM ============

    fn parse_table_expr(&mut self) -> ParseResult<TableExpr> {
        let mut left = self.parse_table_primary()?;
        loop {
            let join_type = if self.try_consume(&Token::Comma) {
                if self.at_clause_end() {
                    break;
                }
                let right = self.parse_table_primary()?;
                left = TableExpr::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: JoinType::Cross,
                    condition: None,
                };
                continue;
            } else if self.try_consume_keyword(Keyword::Join) {
                JoinType::Inner
            } else if self.try_consume_keyword(Keyword::Inner) {
                self.expect_keyword(Keyword::Join)?;
                JoinType::Inner
            } else if self.try_consume_keyword(Keyword::Cross) {
                self.expect_keyword(Keyword::Join)?;
                JoinType::Cross
            } else if self.peek_keyword(Keyword::Left)
                && self.peek_ahead(1) != &Token::LParen
            {
                self.advance();
                self.try_consume_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinType::LeftOuter
            } else {
                break;
            };
            self.try_consume_keyword(Keyword::Each);

            let right = self.parse_table_primary()?;
            let condition = if join_type == JoinType::Cross {
                if self.peek_keyword(Keyword::On) {
                    return Err(self.unexpected("no ON clause for CROSS JOIN"));
                }
                None
            } else {
                self.expect_keyword(Keyword::On)?;
                Some(self.parse_expr()?)
            };
            left = TableExpr::Join {
                left: Box::new(left),
                right: Box::new(right),
                join_type,
                condition,
            };
        }
        Ok(left)
    }

    fn parse_table_primary(&mut self) -> ParseResult<TableExpr> {
        if self.try_consume(&Token::LParen) {
            if self.peek_keyword(Keyword::Select) {
                let query = self.parse_select()?;
                self.expect(&Token::RParen)?;
                let alias = self.parse_optional_alias()?;
                return Ok(TableExpr::Subquery {
                    query: Box::new(query),
                    alias,
                });
            }
            let inner = self.parse_table_expr()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        let name = self.parse_dotted_name()?;
        let alias = self.parse_optional_alias()?;
        Ok(TableExpr::Table { name, alias })
    }

    // ============ Expressions ============

    /// Parse an expression (lowest precedence level)
    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.try_consume_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_not()?;
        while self.try_consume_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.try_consume_keyword(Keyword::Not) {
            let expr = self.parse_not()?;
            return Ok(Expr::unary(UnaryOp::Not, expr));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_additive()?;

        let op = match self.peek() {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            Token::Lt => Some(BinaryOp::Lt),
            Token::LtEq => Some(BinaryOp::LtEq),
            Token::Gt => Some(BinaryOp::Gt),
            Token::GtEq => Some(BinaryOp::GtEq),
            Token::Keyword(Keyword::Contains) => Some(BinaryOp::Contains),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expr::binary(left, op, right));
        }

        if self.try_consume_keyword(Keyword::Is) {
            let negated = self.try_consume_keyword(Keyword::Not);
            self.expect_keyword(Keyword::Null)?;
            let op = if negated {
                UnaryOp::IsNotNull
            } else {
                UnaryOp::IsNull
            };
            return Ok(Expr::unary(op, left));
        }

        let negated = self.peek_keyword(Keyword::Not)
            && matches!(
                self.peek_ahead(1),
                Token::Keyword(Keyword::In) | Token::Keyword(Keyword::Between)
            );
        if negated {
            self.advance();
        }

        if self.try_consume_keyword(Keyword::In) {
            self.expect(&Token::LParen)?;
            let list = self.parse_expr_list(&[])?;
            self.expect(&Token::RParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }

        if self.try_consume_keyword(Keyword::Between) {
            let low = self.parse_additive()?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.try_consume(&Token::Minus) {
            // The magnitude of i64::MIN only fits once negated
            if let Token::Integer(n) = *self.peek() {
                if n == i64::MIN.unsigned_abs() {
                    self.advance();
                    return Ok(Expr::Literal(Literal::Integer(i64::MIN)));
                }
            }
            let expr = self.parse_unary()?;
            // Fold negative numeric literals so they stay literals
            return Ok(match expr {
                Expr::Literal(Literal::Integer(i)) if i != i64::MIN => {
                    Expr::Literal(Literal::Integer(-i))
                }
                Expr::Literal(Literal::Float(f)) => Expr::Literal(Literal::Float(-f)),
                other => Expr::unary(UnaryOp::Neg, other),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token {
            Token::Integer(n) => {
                let i = i64::try_from(n).map_err(|_| {
                    ParseError::new("Integer literal out of range", self.current_position())
                })?;
                self.advance();
                Ok(Expr::Literal(Literal::Integer(i)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            Token::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            Token::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Keyword(Keyword::Case) => {
                self.advance();
                self.parse_case()
            }
            // LEFT(str, n) shares its spelling with LEFT JOIN
            Token::Keyword(Keyword::Left) if self.peek_ahead(1) == &Token::LParen => {
                self.advance();
                self.parse_function_call("left".to_string())
            }
            Token::Identifier(_) => {
                let name = self.parse_dotted_name()?;
                if self.peek() == &Token::LParen {
                    self.parse_function_call(name.to_lowercase())
                } else {
                    Ok(Expr::Column(name))
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_function_call(&mut self, name: String) -> ParseResult<Expr> {
        self.expect(&Token::LParen)?;

        if name == "count" {
            if self.peek() == &Token::Star && self.peek_ahead(1) == &Token::RParen {
                self.advance();
                self.advance();
                return Ok(Expr::Function {
                    name,
                    args: vec![Expr::Literal(Literal::Integer(1))],
                });
            }
            if self.try_consume_keyword(Keyword::Distinct) {
                let args = self.parse_expr_list(&[])?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::Function {
                    name: "count_distinct".to_string(),
                    args,
                });
            }
        }

        let args = if self.peek() == &Token::RParen {
            Vec::new()
        } else {
            self.parse_expr_list(&[])?
        };
        self.expect(&Token::RParen)?;
        Ok(Expr::Function { name, args })
    }

    fn parse_case(&mut self) -> ParseResult<Expr> {
        let operand = if self.peek_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        let mut branches = Vec::new();
        while self.try_consume_keyword(Keyword::When) {
            let when = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expr()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            return Err(self.unexpected("WHEN"));
        }

        let else_result = if self.try_consume_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;

        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    /// `a`, `a.b.c`, `[a.b]`; parts are joined with dots
    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.parse_identifier()?;
        while self.peek() == &Token::Dot {
            match self.peek_ahead(1).clone() {
                Token::Identifier(part) => {
                    self.advance();
                    self.advance();
                    name.push('.');
                    name.push_str(&part);
                }
                _ => break,
            }
        }
        Ok(name)
    }

    // ============ Helpers ============

    fn peek(&self) -> &Token {
        self.peek_ahead(0)
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        self.tokens
            .get(self.position + n)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn current_position(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|s| s.position)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn peek_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == keyword)
    }

    fn try_consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<()> {
        if self.try_consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", keyword).to_uppercase()))
        }
    }

    fn try_consume(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        if self.try_consume(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<String> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!("Expected {}, found {}", expected, self.peek()),
            self.current_position(),
        )
    }
}

/// Parse query text into a SELECT statement
pub fn parse(input: &str) -> ParseResult<SelectStatement> {
    Parser::parse_sql(input)
}
