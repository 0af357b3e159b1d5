//! SQL lexer - converts query text into tokens

use std::fmt;

use super::error::ParseError;

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    As,
    From,
    Where,
    Having,
    Join,
    On,
    Group,
    By,
    Each,
    Left,
    Outer,
    Inner,
    Cross,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
    In,
    Distinct,
    Case,
    When,
    Then,
    Else,
    End,
    Contains,
    Between,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        let kw = match word.to_ascii_lowercase().as_str() {
            "select" => Keyword::Select,
            "as" => Keyword::As,
            "from" => Keyword::From,
            "where" => Keyword::Where,
            "having" => Keyword::Having,
            "join" => Keyword::Join,
            "on" => Keyword::On,
            "group" => Keyword::Group,
            "by" => Keyword::By,
            "each" => Keyword::Each,
            "left" => Keyword::Left,
            "outer" => Keyword::Outer,
            "inner" => Keyword::Inner,
            "cross" => Keyword::Cross,
            "order" => Keyword::Order,
            "asc" => Keyword::Asc,
            "desc" => Keyword::Desc,
            "limit" => Keyword::Limit,
            "offset" => Keyword::Offset,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "is" => Keyword::Is,
            "null" => Keyword::Null,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "in" => Keyword::In,
            "distinct" => Keyword::Distinct,
            "case" => Keyword::Case,
            "when" => Keyword::When,
            "then" => Keyword::Then,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "contains" => Keyword::Contains,
            "between" => Keyword::Between,
            _ => return None,
        };
        Some(kw)
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    /// Plain, bracketed or backtick-quoted identifier
    Identifier(String),
    /// Unsigned magnitude; the parser range-checks it, so `-9223372036854775808` works
    Integer(u64),
    Float(f64),
    String(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{}", format!("{:?}", kw).to_uppercase()),
            Token::Identifier(name) => write!(f, "identifier '{}'", name),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Eq => write!(f, "'='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Lt => write!(f, "'<'"),
            Token::LtEq => write!(f, "'<='"),
            Token::Gt => write!(f, "'>'"),
            Token::GtEq => write!(f, "'>='"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// A token and the character offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// SQL lexer
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer over query text
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let position = self.position;
            if self.is_eof() {
                tokens.push(Spanned {
                    token: Token::Eof,
                    position,
                });
                break;
            }
            let token = self.next_token()?;
            tokens.push(Spanned { token, position });
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let ch = self.current_char();
        let single = match ch {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '.' => Some(Token::Dot),
            ';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match ch {
            '=' | '!' | '<' | '>' => self.tokenize_operator(),
            '\'' | '"' => self.tokenize_string(false),
            '[' => self.tokenize_delimited_identifier(']'),
            '`' => self.tokenize_delimited_identifier('`'),
            '0'..='9' => self.tokenize_number(),
            'r' | 'R' if matches!(self.peek(1), Some('\'') | Some('"')) => {
                self.advance();
                self.tokenize_string(true)
            }
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.tokenize_word()),
            _ => Err(self.error(format!("Unexpected character: '{}'", ch))),
        }
    }

    fn tokenize_operator(&mut self) -> Result<Token, ParseError> {
        let ch = self.current_char();
        let next = self.peek(1);
        let (token, len) = match (ch, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', _) => (Token::Eq, 1),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('>')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtEq, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('>', _) => (Token::Gt, 1),
            _ => return Err(self.error(format!("Unexpected character: '{}'", ch))),
        };
        for _ in 0..len {
            self.advance();
        }
        Ok(token)
    }

    fn tokenize_string(&mut self, raw: bool) -> Result<Token, ParseError> {
        let start = self.position;
        let quote = self.current_char();
        self.advance();
        let mut value = String::new();
        loop {
            if self.is_eof() {
                return Err(ParseError::new("Unterminated string literal", start));
            }
            let ch = self.current_char();
            self.advance();
            if ch == quote {
                break;
            }
            if ch == '\\' && !raw {
                if self.is_eof() {
                    return Err(ParseError::new("Unterminated string literal", start));
                }
                let escaped = self.current_char();
                self.advance();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            } else {
                value.push(ch);
            }
        }
        Ok(Token::String(value))
    }

    fn tokenize_delimited_identifier(&mut self, close: char) -> Result<Token, ParseError> {
        let start = self.position;
        self.advance();
        let mut name = String::new();
        while !self.is_eof() && self.current_char() != close {
            name.push(self.current_char());
            self.advance();
        }
        if self.is_eof() {
            return Err(ParseError::new("Unterminated quoted identifier", start));
        }
        self.advance();
        if name.is_empty() {
            return Err(ParseError::new("Empty quoted identifier", start));
        }
        Ok(Token::Identifier(name))
    }

    /// Integers, decimals and exponent forms: 42, 3.14, 1e3, 2.5E-2
    fn tokenize_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position;
        self.consume_digits();

        let mut is_float = false;
        if self.current_char() == '.' && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.consume_digits();
        }

        let mut exponent: Option<i32> = None;
        if matches!(self.current_char(), 'e' | 'E') {
            let sign_len = usize::from(matches!(self.peek(1), Some('+') | Some('-')));
            if self.peek(1 + sign_len).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                let negative = self.current_char() == '-';
                if sign_len == 1 {
                    self.advance();
                }
                let exp_start = self.position;
                self.consume_digits();
                let digits: String = self.input[exp_start..self.position].iter().collect();
                let value: i32 = digits
                    .parse()
                    .map_err(|_| ParseError::new("Exponent out of range", exp_start))?;
                exponent = Some(if negative { -value } else { value });
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        match exponent {
            Some(exp) if !is_float && exp >= 0 => {
                let mantissa: String = text.chars().take_while(char::is_ascii_digit).collect();
                mantissa
                    .parse::<u64>()
                    .ok()
                    .and_then(|m| {
                        10u64
                            .checked_pow(u32::try_from(exp).ok()?)
                            .and_then(|p| m.checked_mul(p))
                    })
                    .map(Token::Integer)
                    .ok_or_else(|| ParseError::new("Integer literal out of range", start))
            }
            Some(_) => text
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ParseError::new("Invalid number", start)),
            None if is_float => text
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ParseError::new("Invalid number", start)),
            None => text
                .parse::<u64>()
                .map(Token::Integer)
                .map_err(|_| ParseError::new("Integer literal out of range", start)),
        }
    }

    fn tokenize_word(&mut self) -> Token {
        let start = self.position;
        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word: String = self.input[start..self.position].iter().collect();
        match Keyword::from_word(&word) {
            Some(kw) => Token::Keyword(kw),
            None => Token::Identifier(word),
        }
    }

    fn consume_digits(&mut self) {
        while !self.is_eof() && self.current_char().is_ascii_digit() {
            self.advance();
        }
    }

    /// Skip whitespace and `--`, `#`, `//` line comments
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_eof() && self.current_char().is_whitespace() {
                self.advance();
            }
            if self.is_eof() {
                break;
            }
            let ch = self.current_char();
            let comment = ch == '#'
                || (ch == '-' && self.peek(1) == Some('-'))
                || (ch == '/' && self.peek(1) == Some('/'));
            if !comment {
                break;
            }
            while !self.is_eof() && self.current_char() != '\n' {
                self.advance();
            }
        }
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn error(&self, message: String) -> ParseError {
        ParseError::new(message, self.position)
    }
}

/// Tokenize query text
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("SeLeCt x FROM t"),
            vec![
                Token::Keyword(Keyword::Select),
                Token::Identifier("x".into()),
                Token::Keyword(Keyword::From),
                Token::Identifier("t".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42")[0], Token::Integer(42));
        assert_eq!(kinds("3.5")[0], Token::Float(3.5));
        assert_eq!(kinds("1e3")[0], Token::Integer(1000));
        assert_eq!(kinds("2.5E-1")[0], Token::Float(0.25));
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn test_leading_dot_is_not_a_number() {
        assert_eq!(kinds(".5"), vec![Token::Dot, Token::Integer(5), Token::Eof]);
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(kinds(r#"'it\'s'"#)[0], Token::String("it's".into()));
        assert_eq!(kinds(r#""a\nb""#)[0], Token::String("a\nb".into()));
        assert_eq!(kinds(r"r'\d+'")[0], Token::String(r"\d+".into()));
        let err = tokenize("'open").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(kinds("[a.b]")[0], Token::Identifier("a.b".into()));
        assert_eq!(kinds("`select`")[0], Token::Identifier("select".into()));
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("= == != <> <= >= < >"),
            vec![
                Token::Eq,
                Token::Eq,
                Token::NotEq,
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::Lt,
                Token::Gt,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("a -- one\n# two\n// three\nb"),
            vec![
                Token::Identifier("a".into()),
                Token::Identifier("b".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unexpected_character_position() {
        let err = tokenize("SELECT ?").unwrap_err();
        assert_eq!(err.position, 7);
    }
}
