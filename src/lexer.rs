use std::fmt;

use serde::Serialize;

use crate::error::{LexError, LexResult, SourceLocation};
use crate::value::{format_float, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenType {
    Def,
    If,
    Elif,
    Else,
    While,
    Continue,
    Break,
    Return,
    Void,
    BoolType,
    StringType,
    IntType,
    FloatType,
    Mut,
    Exist,
    Match,
    Boolean(bool),
    String(String),
    Integer(i32),
    Float(f32),
    Identifier(String),
    Equal,
    Bang,
    AndAnd,
    OrOr,
    EqualEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Question,
    FatArrow, // => in match cases
    Semicolon,
    Comma,
    Comment(String),
    Unknown(char),
    Eof,
}

impl fmt::Display for TokenType {
    /// Renders the token back to source text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenType::Def => write!(f, "def"),
            TokenType::If => write!(f, "if"),
            TokenType::Elif => write!(f, "elif"),
            TokenType::Else => write!(f, "else"),
            TokenType::While => write!(f, "while"),
            TokenType::Continue => write!(f, "continue"),
            TokenType::Break => write!(f, "break"),
            TokenType::Return => write!(f, "return"),
            TokenType::Void => write!(f, "void"),
            TokenType::BoolType => write!(f, "bool"),
            TokenType::StringType => write!(f, "string"),
            TokenType::IntType => write!(f, "int"),
            TokenType::FloatType => write!(f, "float"),
            TokenType::Mut => write!(f, "mut"),
            TokenType::Exist => write!(f, "exist"),
            TokenType::Match => write!(f, "match"),
            TokenType::Boolean(value) => write!(f, "{}", value),
            TokenType::String(value) => write!(f, "\"{}\"", escape_string(value)),
            TokenType::Integer(value) => write!(f, "{}", value),
            TokenType::Float(value) => write!(f, "{}", format_float(*value)),
            TokenType::Identifier(name) => write!(f, "{}", name),
            TokenType::Equal => write!(f, "="),
            TokenType::Bang => write!(f, "!"),
            TokenType::AndAnd => write!(f, "&&"),
            TokenType::OrOr => write!(f, "||"),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::NotEqual => write!(f, "!="),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::Less => write!(f, "<"),
            TokenType::Greater => write!(f, ">"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Percent => write!(f, "%"),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::Question => write!(f, "?"),
            TokenType::FatArrow => write!(f, "=>"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Comma => write!(f, ","),
            TokenType::Comment(text) => write!(f, "#{}", text),
            TokenType::Unknown(ch) => write!(f, "{}", ch),
            TokenType::Eof => Ok(()),
        }
    }
}

fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\t' => escaped.push_str("\\t"),
            '\u{8}' => escaped.push_str("\\b"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{c}' => escaped.push_str("\\f"),
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escaped_char(ch: char) -> char {
    match ch {
        't' => '\t',
        'b' => '\u{8}',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{c}',
        '\'' => '\'',
        '"' => '"',
        _ => '\\',
    }
}

fn keyword(word: &str) -> Option<TokenType> {
    let token_type = match word {
        "def" => TokenType::Def,
        "if" => TokenType::If,
        "elif" => TokenType::Elif,
        "else" => TokenType::Else,
        "while" => TokenType::While,
        "continue" => TokenType::Continue,
        "break" => TokenType::Break,
        "return" => TokenType::Return,
        "void" => TokenType::Void,
        "bool" => TokenType::BoolType,
        "string" => TokenType::StringType,
        "int" => TokenType::IntType,
        "float" => TokenType::FloatType,
        "mut" => TokenType::Mut,
        "exist" => TokenType::Exist,
        "match" => TokenType::Match,
        "true" => TokenType::Boolean(true),
        "false" => TokenType::Boolean(false),
        _ => return None,
    };
    Some(token_type)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub token_type: TokenType,
    pub location: SourceLocation,
}

impl Token {
    /// Scalar payload of literal, identifier and comment tokens.
    pub fn value(&self) -> Option<Value> {
        match &self.token_type {
            TokenType::Integer(v) => Some(Value::Int(*v)),
            TokenType::Float(v) => Some(Value::Float(*v)),
            TokenType::Boolean(v) => Some(Value::Bool(*v)),
            TokenType::String(v) | TokenType::Identifier(v) | TokenType::Comment(v) => {
                Some(Value::Str(v.clone()))
            }
            _ => None,
        }
    }
}

pub const DEFAULT_MAX_TEXT_LENGTH: usize = i32::MAX as usize;

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    max_text_length: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }

    /// Limits the length of identifiers, string literals and comments.
    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    /// Scans the whole input, including the trailing `Eof` token.
    pub fn tokenize(&mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.token_type == TokenType::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Produces the next token; keeps returning `Eof` once the input is
    /// exhausted.
    pub fn next_token(&mut self) -> LexResult<Token> {
        self.skip_whitespace();

        let location = SourceLocation::new(self.line, self.column);
        if self.is_at_end() {
            return Ok(Token {
                token_type: TokenType::Eof,
                location,
            });
        }

        let ch = self.current_char();
        let token_type = match ch {
            '+' => self.single(TokenType::Plus),
            '-' => self.single(TokenType::Minus),
            '*' => self.single(TokenType::Star),
            '/' => self.single(TokenType::Slash),
            '%' => self.single(TokenType::Percent),
            '(' => self.single(TokenType::LeftParen),
            ')' => self.single(TokenType::RightParen),
            '{' => self.single(TokenType::LeftBrace),
            '}' => self.single(TokenType::RightBrace),
            ';' => self.single(TokenType::Semicolon),
            ',' => self.single(TokenType::Comma),
            '?' => self.single(TokenType::Question),
            '=' => {
                self.advance();
                match self.current_char() {
                    '=' => self.single(TokenType::EqualEqual),
                    '>' => self.single(TokenType::FatArrow),
                    _ => TokenType::Equal,
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(TokenType::NotEqual)
                } else {
                    TokenType::Bang
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(TokenType::LessEqual)
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.single(TokenType::GreaterEqual)
                } else {
                    TokenType::Greater
                }
            }
            '&' => self.read_doubled('&', TokenType::AndAnd, location)?,
            '|' => self.read_doubled('|', TokenType::OrOr, location)?,
            '"' => self.read_string(location)?,
            '#' => self.read_comment(location)?,
            _ if ch.is_lowercase() => self.read_identifier(location)?,
            _ if ch.is_ascii_digit() => self.read_number(location)?,
            _ => self.single(TokenType::Unknown(ch)),
        };

        tracing::trace!(token = ?token_type, %location, "scanned token");

        Ok(Token {
            token_type,
            location,
        })
    }

    fn single(&mut self, token_type: TokenType) -> TokenType {
        self.advance();
        token_type
    }

    fn read_doubled(
        &mut self,
        character: char,
        token_type: TokenType,
        location: SourceLocation,
    ) -> LexResult<TokenType> {
        self.advance();
        if self.current_char() == character {
            self.advance();
            Ok(token_type)
        } else {
            Err(LexError::MissingOperatorCharacter {
                character,
                location,
            })
        }
    }

    fn read_string(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        self.advance(); // Skip opening quote
        let mut value = String::new();
        let mut length = 0;

        loop {
            if self.is_at_end() {
                return Err(LexError::UnterminatedString { location });
            }

            match self.current_char() {
                '"' => {
                    self.advance(); // Skip closing quote
                    return Ok(TokenType::String(value));
                }
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        return Err(LexError::UnterminatedString { location });
                    }
                    value.push(escaped_char(self.current_char()));
                }
                ch => value.push(ch),
            }

            length += 1;
            self.check_length(length, location)?;
            self.advance();
        }
    }

    fn read_comment(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        self.advance(); // Skip '#'
        let mut text = String::new();
        let mut length = 0;

        while !self.is_at_end() && self.current_char() != '\n' {
            text.push(self.current_char());
            length += 1;
            self.check_length(length, location)?;
            self.advance();
        }

        Ok(TokenType::Comment(text))
    }

    fn read_identifier(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        let mut value = String::new();
        let mut length = 0;

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            value.push(self.current_char());
            length += 1;
            self.check_length(length, location)?;
            self.advance();
        }

        Ok(keyword(&value).unwrap_or(TokenType::Identifier(value)))
    }

    fn read_number(&mut self, location: SourceLocation) -> LexResult<TokenType> {
        while self.current_char() == '0' {
            self.advance();
        }

        let mut int_part: i32 = 0;
        while let Some(digit) = self.current_digit() {
            int_part = int_part
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit as i32))
                .ok_or(LexError::IntegerOverflow { location })?;
            self.advance();
        }

        if self.current_char() != '.' {
            return Ok(TokenType::Integer(int_part));
        }
        self.advance(); // Skip '.'

        if self.current_digit().is_none() {
            return Err(LexError::IncorrectFloatPart { location });
        }

        let mut fraction: i64 = 0;
        let mut decimal_places = 0;
        while let Some(digit) = self.current_digit() {
            decimal_places += 1;
            fraction = fraction
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or(LexError::FloatPartOverflow { location })?;
            self.advance();
        }

        let value = int_part as f32 + (fraction as f64 / 10f64.powi(decimal_places)) as f32;
        check_float(value, location)?;
        Ok(TokenType::Float(value))
    }

    fn current_digit(&self) -> Option<u32> {
        self.current_char().to_digit(10)
    }

    fn check_length(&self, length: usize, location: SourceLocation) -> LexResult<()> {
        if length > self.max_text_length {
            return Err(LexError::TextTooLong { location });
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn current_char(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            if self.current_char() == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }
}

fn check_float(value: f32, location: SourceLocation) -> LexResult<()> {
    let kind = if value == f32::INFINITY {
        "positive infinity"
    } else if value == f32::NEG_INFINITY {
        "negative infinity"
    } else if value == 0.0 && value.is_sign_negative() {
        "negative zero"
    } else if value == 0.0 {
        "positive zero"
    } else {
        return Ok(());
    };
    Err(LexError::FloatOutOfRange { kind, location })
}
