use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::ast::TypeSpecifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// Lexer Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{location}: Integer literal overflows a 32-bit integer")]
    IntegerOverflow { location: SourceLocation },
    #[error("{location}: Fractional part of float literal overflows")]
    FloatPartOverflow { location: SourceLocation },
    #[error("{location}: Expected digits after '.' in float literal")]
    IncorrectFloatPart { location: SourceLocation },
    #[error("{location}: Float literal evaluates to {kind}")]
    FloatOutOfRange {
        kind: &'static str,
        location: SourceLocation,
    },
    #[error("{location}: Unterminated string literal")]
    UnterminatedString { location: SourceLocation },
    #[error("{location}: Expected '{character}{character}', found a single '{character}'")]
    MissingOperatorCharacter {
        character: char,
        location: SourceLocation,
    },
    #[error("{location}: Identifier, string or comment is too long")]
    TextTooLong { location: SourceLocation },
}

// Parser Errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{location}: Expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: Expected an expression in {context}")]
    MissingExpression {
        context: &'static str,
        location: SourceLocation,
    },
    #[error("{location}: Block of {context} must contain at least one statement")]
    EmptyBlock {
        context: &'static str,
        location: SourceLocation,
    },
    #[error("{location}: Expected 'else' block after exist statement, found {found}")]
    MissingElseBlock {
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: Exist statement accepts only a variable name")]
    InvalidExistTarget { location: SourceLocation },
    #[error("{location}: Expected a variable or function definition, found {found}")]
    UnknownDefinition {
        found: String,
        location: SourceLocation,
    },
    #[error("{location}: Value of type {value_type} cannot be negated with '-'")]
    ArithmeticNegation {
        value_type: TypeSpecifier,
        location: SourceLocation,
    },
    #[error("{location}: Value of type {value_type} cannot be negated with '!'")]
    LogicalNegation {
        value_type: TypeSpecifier,
        location: SourceLocation,
    },
    #[error("{location}: String literal cannot be negated")]
    NegatedString { location: SourceLocation },
    #[error("{location}: Expression is already negated with the other operator")]
    ConflictingNegation { location: SourceLocation },
}

// Runtime Errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Function '{name}' has already been declared")]
    FunctionAlreadyDefined { name: String },
    #[error("Function name '{name}' is reserved for a built-in")]
    RestrictedFunctionName { name: String },
    #[error("Variable '{name}' has already been declared")]
    VariableAlreadyDefined { name: String },
    #[error("Parameter '{parameter}' of function '{function}' has already been declared")]
    ParameterAlreadyDeclared { parameter: String, function: String },
    #[error("Function '{name}' has not been declared")]
    FunctionNotDeclared { name: String },
    #[error("Variable '{name}' has not been declared in this scope")]
    VariableNotDeclared { name: String },
    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    WrongParameterCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("'{name}' of type {expected} cannot hold a value of type {found}")]
    MismatchedTypes {
        name: String,
        expected: TypeSpecifier,
        found: TypeSpecifier,
    },
    #[error("Function '{function}' must return {expected}, got {found}")]
    IncorrectReturnType {
        function: String,
        expected: TypeSpecifier,
        found: TypeSpecifier,
    },
    #[error("Mismatched operand types in {operation} operation: {left} and {right}")]
    MismatchedOperands {
        operation: &'static str,
        left: TypeSpecifier,
        right: TypeSpecifier,
    },
    #[error("{operation} operation is not defined for type {value_type}")]
    IncorrectTypeInOperation {
        operation: &'static str,
        value_type: TypeSpecifier,
    },
    #[error("Result of {context} of type {value_type} cannot be negated with '-'")]
    ArithmeticNegation {
        value_type: TypeSpecifier,
        context: String,
    },
    #[error("Result of {context} of type {value_type} cannot be negated with '!'")]
    LogicalNegation {
        value_type: TypeSpecifier,
        context: String,
    },
    #[error("Assignment cannot be negated")]
    NegatedAssignment,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {operation} operation")]
    IntegerOverflow { operation: &'static str },
    #[error("Variable '{name}' is not mutable")]
    ReassignNonMutable { name: String },
    #[error("Variable '{name}' has no value but is not optional")]
    MissingValue { name: String },
    #[error("Cannot use break/continue outside a loop in function '{function}'")]
    JumpOutsideLoop { function: String },
    #[error("Expression in {context} did not produce a value")]
    UnresolvedExpression { context: &'static str },
    #[error("Cannot convert \"{value}\" with {function}")]
    InvalidConversion { function: String, value: String },
    #[error("Function '{function}' does not accept an argument of type {found}")]
    UnsupportedArgumentType {
        function: String,
        found: TypeSpecifier,
    },
    #[error("Call depth exceeded {limit} while calling '{function}'")]
    CallDepthExceeded { function: String, limit: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Top-level Errors
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LexError> for ScriptError {
    fn from(err: LexError) -> Self {
        ScriptError::Parse(ParseError::Lex(err))
    }
}

// Result types
pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type EvalResult<T> = Result<T, RuntimeError>;
