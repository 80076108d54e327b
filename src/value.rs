use std::fmt;

use serde::Serialize;

use crate::ast::TypeSpecifier;

/// A fully evaluated scalar, carried by literal tokens and produced by
/// every expression that resolves to a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn type_specifier(&self) -> TypeSpecifier {
        match self {
            Value::Int(_) => TypeSpecifier::Int,
            Value::Float(_) => TypeSpecifier::Float,
            Value::Bool(_) => TypeSpecifier::Bool,
            Value::Str(_) => TypeSpecifier::String,
        }
    }
}

/// Renders a float so that it always reads back as a float literal.
pub fn format_float(value: f32) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
        }
    }
}
