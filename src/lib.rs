pub mod ast;
pub mod builtins;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod stack;
pub mod value;

pub use ast::Program;
pub use error::{LexError, ParseError, RuntimeError, ScriptError};
pub use interpreter::Interpreter;
pub use lexer::Lexer;
pub use parser::Parser;
pub use value::Value;

/// Lexes and parses a complete source text.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(Lexer::new(source))?.parse()
}

/// Parses and executes a program that declares its own `main`.
pub fn run(source: &str) -> Result<String, ScriptError> {
    let program = parse(source)?;
    Ok(Interpreter::new(&program).execute()?)
}

/// Like [`run`], but a source made only of global definitions gets an
/// empty `main`.
pub fn run_snippet(source: &str) -> Result<String, ScriptError> {
    let program = parse(source)?.with_implicit_main();
    Ok(Interpreter::new(&program).execute()?)
}
