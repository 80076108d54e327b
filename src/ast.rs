use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// Name under which a match subject is visible to its case guards.
pub const MATCH_SUBJECT: &str = "var";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeSpecifier {
    Int,
    Float,
    String,
    Bool,
    Void,
    Unknown, // absent value, e.g. an unset match subject
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TypeSpecifier::Int => "int",
            TypeSpecifier::Float => "float",
            TypeSpecifier::String => "string",
            TypeSpecifier::Bool => "bool",
            TypeSpecifier::Void => "void",
            TypeSpecifier::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Unary negation recorded on an expression at parse time and applied to
/// its value once evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotValue {
    Arithmetic, // '-'
    Logical,    // '!'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Add,
    Sub,
    Multi,
    Div,
    Modulo,
    Less,
    LessEq,
    More,
    MoreEq,
    Equal,
    NotEqual,
    And,
    Or,
    Assign,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: TypeSpecifier,
    pub mutable: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: TypeSpecifier,
    pub mutable: bool,
    pub optional: bool,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub return_type: TypeSpecifier,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionalBlock {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchCase {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JumpStatement {
    Return(Option<Expression>),
    Break,
    Continue,
}

#[derive(Debug, Clone, Serialize)]
pub enum Statement {
    VariableDefinition(VariableDefinition),
    IfElse {
        if_block: ConditionalBlock,
        elif_blocks: Vec<ConditionalBlock>,
        else_body: Option<Vec<Statement>>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Jump(JumpStatement),
    Exist {
        target: Expression,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    PatternMatching {
        subject: Expression,
        cases: Vec<MatchCase>,
    },
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub negation: Option<NotValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    Literal {
        value: Value,
        negation: Option<NotValue>,
    },
    Variable {
        name: String,
        negation: Option<NotValue>,
    },
    Operator {
        left: Box<Expression>,
        operator: Operator,
        right: Box<Expression>,
        negation: Option<NotValue>,
    },
    FunctionCall(FunctionCall),
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal {
            value,
            negation: None,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable {
            name: name.into(),
            negation: None,
        }
    }

    pub fn binary(left: Expression, operator: Operator, right: Expression) -> Self {
        Expression::Operator {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            negation: None,
        }
    }

    pub fn negation(&self) -> Option<NotValue> {
        match self {
            Expression::Literal { negation, .. }
            | Expression::Variable { negation, .. }
            | Expression::Operator { negation, .. } => *negation,
            Expression::FunctionCall(call) => call.negation,
        }
    }

    pub fn set_negation(&mut self, value: Option<NotValue>) {
        match self {
            Expression::Literal { negation, .. }
            | Expression::Variable { negation, .. }
            | Expression::Operator { negation, .. } => *negation = value,
            Expression::FunctionCall(call) => call.negation = value,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    pub functions: Vec<FunctionDefinition>,
    pub variables: Vec<VariableDefinition>,
}

impl Program {
    pub fn find_function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Adds an empty `void main()` when the program does not define one,
    /// so a snippet made only of global definitions can be executed.
    pub fn with_implicit_main(mut self) -> Self {
        if self.find_function("main").is_none() {
            self.functions.push(FunctionDefinition {
                name: "main".to_string(),
                return_type: TypeSpecifier::Void,
                parameters: Vec::new(),
                body: vec![Statement::Jump(JumpStatement::Return(None))],
            });
        }
        self
    }
}
