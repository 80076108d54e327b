use crate::ast::{
    ConditionalBlock, Expression, FunctionCall, FunctionDefinition, JumpStatement, MatchCase,
    NotValue, Operator, Parameter, Program, Statement, TypeSpecifier, VariableDefinition,
    MATCH_SUBJECT,
};
use crate::error::{LexResult, ParseError, ParseResult, SourceLocation};
use crate::lexer::{Lexer, Token, TokenType};
use crate::value::Value;

type ExpressionRule = fn(&mut Parser) -> ParseResult<Option<Expression>>;

pub struct Parser {
    lexer: Lexer,
    current: Token,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> ParseResult<Self> {
        let current = pull_significant_token(&mut lexer)?;
        Ok(Self { lexer, current })
    }

    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut program = Program::default();

        while !self.is_at_end() {
            if let Some(variable) = self.try_parse_variable_definition()? {
                tracing::debug!(name = %variable.name, "parsed global variable");
                program.variables.push(variable);
            } else if let Some(function) = self.try_parse_function_definition()? {
                tracing::debug!(
                    name = %function.name,
                    parameters = function.parameters.len(),
                    "parsed function"
                );
                program.functions.push(function);
            } else {
                return Err(ParseError::UnknownDefinition {
                    found: describe(self.peek()),
                    location: self.peek().location,
                });
            }
        }

        Ok(program)
    }

    // Definitions

    fn try_parse_variable_definition(&mut self) -> ParseResult<Option<VariableDefinition>> {
        let mutable = self.match_token(&TokenType::Mut)?;

        let var_type = match self.parse_type(false)? {
            Some(var_type) => var_type,
            None if mutable => return Err(self.unexpected("type after 'mut'")),
            None => return Ok(None),
        };

        let optional = self.match_token(&TokenType::Question)?;
        let name = self.expect_identifier("variable name")?;

        let value = if self.check(&TokenType::Equal) {
            let location = self.advance()?.location;
            Some(self.require_expression("variable definition", location)?)
        } else {
            None
        };

        self.expect(&TokenType::Semicolon, "';'")?;

        Ok(Some(VariableDefinition {
            name,
            var_type,
            mutable,
            optional,
            value,
        }))
    }

    fn try_parse_function_definition(&mut self) -> ParseResult<Option<FunctionDefinition>> {
        if !self.match_token(&TokenType::Def)? {
            return Ok(None);
        }

        let return_type = self
            .parse_type(true)?
            .ok_or_else(|| self.unexpected("return type"))?;
        let name = self.expect_identifier("function name")?;
        let parameters = self.parse_parameters()?;
        let body = self.parse_block("function")?;

        Ok(Some(FunctionDefinition {
            name,
            return_type,
            parameters,
            body,
        }))
    }

    fn parse_type(&mut self, allow_void: bool) -> ParseResult<Option<TypeSpecifier>> {
        let type_specifier = match self.peek().token_type {
            TokenType::IntType => TypeSpecifier::Int,
            TokenType::FloatType => TypeSpecifier::Float,
            TokenType::StringType => TypeSpecifier::String,
            TokenType::BoolType => TypeSpecifier::Bool,
            TokenType::Void if allow_void => TypeSpecifier::Void,
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(type_specifier))
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.expect(&TokenType::LeftParen, "'('")?;
        let mut parameters = Vec::new();

        if self.match_token(&TokenType::RightParen)? {
            return Ok(parameters);
        }

        loop {
            parameters.push(self.parse_parameter()?);
            if !self.match_token(&TokenType::Comma)? {
                self.expect(&TokenType::RightParen, "',' or ')'")?;
                return Ok(parameters);
            }
        }
    }

    fn parse_parameter(&mut self) -> ParseResult<Parameter> {
        let mutable = self.match_token(&TokenType::Mut)?;
        let param_type = self
            .parse_type(false)?
            .ok_or_else(|| self.unexpected("parameter type"))?;
        let optional = self.match_token(&TokenType::Question)?;
        let name = self.expect_identifier("parameter name")?;

        Ok(Parameter {
            name,
            param_type,
            mutable,
            optional,
        })
    }

    // Statements

    fn parse_block(&mut self, context: &'static str) -> ParseResult<Vec<Statement>> {
        self.expect(&TokenType::LeftBrace, "'{'")?;
        let mut statements = Vec::new();

        while let Some(statement) = self.parse_statement()? {
            statements.push(statement);
            self.match_token(&TokenType::Semicolon)?;
        }

        let location = self.peek().location;
        self.expect(&TokenType::RightBrace, "'}'")?;

        if statements.is_empty() {
            return Err(ParseError::EmptyBlock { context, location });
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Option<Statement>> {
        if let Some(definition) = self.try_parse_variable_definition()? {
            return Ok(Some(Statement::VariableDefinition(definition)));
        }
        if let Some(expression) = self.parse_expression()? {
            return Ok(Some(Statement::Expression(expression)));
        }

        let statement = match self.peek().token_type {
            TokenType::If => self.parse_if_else()?,
            TokenType::While => self.parse_while()?,
            TokenType::Return | TokenType::Break | TokenType::Continue => self.parse_jump()?,
            TokenType::Exist => self.parse_exist()?,
            TokenType::Match => self.parse_match()?,
            _ => return Ok(None),
        };
        Ok(Some(statement))
    }

    fn parse_condition(&mut self, context: &'static str) -> ParseResult<Expression> {
        let location = self.expect(&TokenType::LeftParen, "'('")?.location;
        let condition = self.require_expression(context, location)?;
        self.expect(&TokenType::RightParen, "')'")?;
        Ok(condition)
    }

    fn parse_if_else(&mut self) -> ParseResult<Statement> {
        self.advance()?; // consume 'if'
        let if_block = ConditionalBlock {
            condition: self.parse_condition("if condition")?,
            body: self.parse_block("if")?,
        };

        let mut elif_blocks = Vec::new();
        while self.match_token(&TokenType::Elif)? {
            elif_blocks.push(ConditionalBlock {
                condition: self.parse_condition("elif condition")?,
                body: self.parse_block("elif")?,
            });
        }

        let else_body = if self.match_token(&TokenType::Else)? {
            Some(self.parse_block("else")?)
        } else {
            None
        };

        Ok(Statement::IfElse {
            if_block,
            elif_blocks,
            else_body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.advance()?; // consume 'while'
        let condition = self.parse_condition("while condition")?;
        let body = self.parse_block("while")?;
        Ok(Statement::While { condition, body })
    }

    fn parse_jump(&mut self) -> ParseResult<Statement> {
        let jump = match self.advance()?.token_type {
            TokenType::Break => JumpStatement::Break,
            TokenType::Continue => JumpStatement::Continue,
            _ => JumpStatement::Return(self.parse_expression()?),
        };
        Ok(Statement::Jump(jump))
    }

    fn parse_exist(&mut self) -> ParseResult<Statement> {
        self.advance()?; // consume 'exist'
        let location = self.expect(&TokenType::LeftParen, "'('")?.location;

        let target = self.require_expression("exist statement", location)?;
        if !matches!(target, Expression::Variable { negation: None, .. }) {
            return Err(ParseError::InvalidExistTarget { location });
        }
        self.expect(&TokenType::RightParen, "')'")?;

        let body = self.parse_block("exist")?;

        if !self.match_token(&TokenType::Else)? {
            return Err(ParseError::MissingElseBlock {
                found: describe(self.peek()),
                location: self.peek().location,
            });
        }
        let else_body = self.parse_block("exist else")?;

        Ok(Statement::Exist {
            target,
            body,
            else_body,
        })
    }

    fn parse_match(&mut self) -> ParseResult<Statement> {
        self.advance()?; // consume 'match'
        let subject = self.parse_condition("match subject")?;
        self.expect(&TokenType::LeftBrace, "'{'")?;

        let mut cases = Vec::new();
        while !self.check(&TokenType::RightBrace) {
            let location = self.peek().location;
            let condition = self
                .parse_match_or()?
                .ok_or(ParseError::MissingExpression {
                    context: "match case",
                    location,
                })?;
            self.expect(&TokenType::FatArrow, "'=>'")?;
            let body = self.parse_block("match case")?;
            cases.push(MatchCase { condition, body });
        }

        let location = self.advance()?.location; // consume '}'
        if cases.is_empty() {
            return Err(ParseError::EmptyBlock {
                context: "match",
                location,
            });
        }

        Ok(Statement::PatternMatching { subject, cases })
    }

    // Expressions

    /// Parses a full expression, including right-associative assignment.
    /// Returns `None` without consuming anything when no expression starts
    /// at the current token.
    pub fn parse_expression(&mut self) -> ParseResult<Option<Expression>> {
        let Some(left) = self.parse_logical_or()? else {
            return Ok(None);
        };

        if !matches!(left, Expression::Variable { .. }) || !self.check(&TokenType::Equal) {
            return Ok(Some(left));
        }

        let location = self.advance()?.location; // consume '='
        let right = self.require_expression("assignment", location)?;
        Ok(Some(Expression::binary(left, Operator::Assign, right)))
    }

    fn parse_logical_or(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_logical_and, Self::parse_logical_or, |t| match t {
            TokenType::OrOr => Some(Operator::Or),
            _ => None,
        })
    }

    fn parse_logical_and(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_equality, Self::parse_logical_and, |t| match t {
            TokenType::AndAnd => Some(Operator::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_relational, Self::parse_equality, |t| match t {
            TokenType::EqualEqual => Some(Operator::Equal),
            TokenType::NotEqual => Some(Operator::NotEqual),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_additive, Self::parse_relational, |t| match t {
            TokenType::Less => Some(Operator::Less),
            TokenType::LessEqual => Some(Operator::LessEq),
            TokenType::Greater => Some(Operator::More),
            TokenType::GreaterEqual => Some(Operator::MoreEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_multiplicative, Self::parse_additive, |t| match t {
            TokenType::Plus => Some(Operator::Add),
            TokenType::Minus => Some(Operator::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_primary, Self::parse_multiplicative, |t| match t {
            TokenType::Star => Some(Operator::Multi),
            TokenType::Slash => Some(Operator::Div),
            TokenType::Percent => Some(Operator::Modulo),
            _ => None,
        })
    }

    /// `operand (OP rest)?` where `rest` is the same precedence level, so
    /// chains nest to the right.
    fn parse_chain(
        &mut self,
        operand: ExpressionRule,
        rest: ExpressionRule,
        operator_of: fn(&TokenType) -> Option<Operator>,
    ) -> ParseResult<Option<Expression>> {
        let Some(left) = operand(self)? else {
            return Ok(None);
        };
        let Some(operator) = operator_of(&self.peek().token_type) else {
            return Ok(Some(left));
        };

        let location = self.advance()?.location;
        let right = rest(self)?.ok_or(ParseError::MissingExpression {
            context: "right operand",
            location,
        })?;
        Ok(Some(Expression::binary(left, operator, right)))
    }

    fn parse_primary(&mut self) -> ParseResult<Option<Expression>> {
        let location = self.peek().location;
        let negation = match self.peek().token_type {
            TokenType::Minus => Some(NotValue::Arithmetic),
            TokenType::Bang => Some(NotValue::Logical),
            _ => None,
        };
        if negation.is_some() {
            self.advance()?;
        }

        let expression = match self.peek().token_type.clone() {
            TokenType::LeftParen => {
                let open = self.advance()?.location;
                let inner = self.require_expression("parentheses", open)?;
                self.expect(&TokenType::RightParen, "')'")?;
                validated_negation(inner, negation, location)?
            }
            TokenType::Identifier(name) => {
                self.advance()?;
                if self.match_token(&TokenType::LeftParen)? {
                    let args = self.parse_arguments()?;
                    Expression::FunctionCall(FunctionCall {
                        name,
                        args,
                        negation,
                    })
                } else {
                    Expression::Variable { name, negation }
                }
            }
            TokenType::Integer(v) => self.parse_literal(Value::Int(v), negation, location)?,
            TokenType::Float(v) => self.parse_literal(Value::Float(v), negation, location)?,
            TokenType::Boolean(v) => self.parse_literal(Value::Bool(v), negation, location)?,
            TokenType::String(v) => self.parse_literal(Value::Str(v), negation, location)?,
            _ if negation.is_some() => {
                return Err(ParseError::MissingExpression {
                    context: "negation",
                    location,
                })
            }
            _ => return Ok(None),
        };

        Ok(Some(expression))
    }

    fn parse_literal(
        &mut self,
        value: Value,
        negation: Option<NotValue>,
        location: SourceLocation,
    ) -> ParseResult<Expression> {
        check_literal_negation(&value, negation, location)?;
        self.advance()?;
        Ok(Expression::Literal { value, negation })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();

        if self.match_token(&TokenType::RightParen)? {
            return Ok(args);
        }

        loop {
            let location = self.peek().location;
            args.push(self.require_expression("function arguments", location)?);
            if !self.match_token(&TokenType::Comma)? {
                self.expect(&TokenType::RightParen, "',' or ')'")?;
                return Ok(args);
            }
        }
    }

    // Match case guards

    fn parse_match_or(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_match_and, Self::parse_match_or, |t| match t {
            TokenType::OrOr => Some(Operator::Or),
            _ => None,
        })
    }

    fn parse_match_and(&mut self) -> ParseResult<Option<Expression>> {
        self.parse_chain(Self::parse_match_predicate, Self::parse_match_and, |t| match t {
            TokenType::AndAnd => Some(Operator::And),
            _ => None,
        })
    }

    fn parse_match_predicate(&mut self) -> ParseResult<Option<Expression>> {
        if !self.check(&TokenType::Bang) {
            return self.parse_match_operand();
        }

        let location = self.advance()?.location; // consume '!'
        if matches!(
            self.peek().token_type,
            TokenType::Integer(_)
                | TokenType::Float(_)
                | TokenType::String(_)
                | TokenType::Boolean(_)
                | TokenType::Minus
        ) {
            // `!5` compares the subject against the literal
            return self
                .parse_match_comparison(Operator::NotEqual, location)
                .map(Some);
        }

        let inner = self
            .parse_match_operand()?
            .ok_or(ParseError::MissingExpression {
                context: "match case",
                location,
            })?;
        validated_negation(inner, Some(NotValue::Logical), location).map(Some)
    }

    fn parse_match_operand(&mut self) -> ParseResult<Option<Expression>> {
        let location = self.peek().location;
        let operator = match self.peek().token_type.clone() {
            TokenType::LeftParen => {
                self.advance()?;
                let inner = self
                    .parse_match_or()?
                    .ok_or(ParseError::MissingExpression {
                        context: "match case",
                        location,
                    })?;
                self.expect(&TokenType::RightParen, "')'")?;
                return Ok(Some(inner));
            }
            TokenType::Identifier(name) => {
                self.advance()?;
                return Ok(Some(Expression::FunctionCall(FunctionCall {
                    name,
                    args: vec![Expression::variable(MATCH_SUBJECT)],
                    negation: None,
                })));
            }
            TokenType::Less => Operator::Less,
            TokenType::LessEqual => Operator::LessEq,
            TokenType::Greater => Operator::More,
            TokenType::GreaterEqual => Operator::MoreEq,
            TokenType::EqualEqual => Operator::Equal,
            TokenType::NotEqual => Operator::NotEqual,
            _ => return Ok(None),
        };

        self.advance()?; // consume comparison operator
        self.parse_match_comparison(operator, location).map(Some)
    }

    fn parse_match_comparison(
        &mut self,
        operator: Operator,
        location: SourceLocation,
    ) -> ParseResult<Expression> {
        let right = self
            .parse_primary()?
            .ok_or(ParseError::MissingExpression {
                context: "match case comparison",
                location,
            })?;
        Ok(Expression::binary(
            Expression::variable(MATCH_SUBJECT),
            operator,
            right,
        ))
    }

    // Token helpers

    fn require_expression(
        &mut self,
        context: &'static str,
        location: SourceLocation,
    ) -> ParseResult<Expression> {
        self.parse_expression()?
            .ok_or(ParseError::MissingExpression { context, location })
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<String> {
        match &self.peek().token_type {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn expect(&mut self, token_type: &TokenType, expected: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn match_token(&mut self, token_type: &TokenType) -> ParseResult<bool> {
        if self.check(token_type) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: describe(self.peek()),
            location: self.peek().location,
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        self.peek().token_type == *token_type
    }

    fn peek(&self) -> &Token {
        &self.current
    }

    fn advance(&mut self) -> ParseResult<Token> {
        let next = pull_significant_token(&mut self.lexer)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }
}

/// Next token that is not a comment.
fn pull_significant_token(lexer: &mut Lexer) -> LexResult<Token> {
    loop {
        let token = lexer.next_token()?;
        if !matches!(token.token_type, TokenType::Comment(_)) {
            return Ok(token);
        }
    }
}

fn describe(token: &Token) -> String {
    match token.token_type {
        TokenType::Eof => "end of input".to_string(),
        ref token_type => format!("'{}'", token_type),
    }
}

fn check_literal_negation(
    value: &Value,
    negation: Option<NotValue>,
    location: SourceLocation,
) -> ParseResult<()> {
    match (value, negation) {
        (Value::Str(_), Some(_)) => Err(ParseError::NegatedString { location }),
        (Value::Int(_) | Value::Float(_), Some(NotValue::Logical)) => {
            Err(ParseError::LogicalNegation {
                value_type: value.type_specifier(),
                location,
            })
        }
        (Value::Bool(_), Some(NotValue::Arithmetic)) => Err(ParseError::ArithmeticNegation {
            value_type: value.type_specifier(),
            location,
        }),
        _ => Ok(()),
    }
}

/// Applies a negation written in front of a parenthesized expression:
/// the same kind cancels, the opposite kind on an already negated
/// expression is rejected.
fn validated_negation(
    mut expression: Expression,
    negation: Option<NotValue>,
    location: SourceLocation,
) -> ParseResult<Expression> {
    let Some(negation) = negation else {
        return Ok(expression);
    };

    match expression.negation() {
        None => {
            if let Expression::Literal { value, .. } = &expression {
                check_literal_negation(value, Some(negation), location)?;
            }
            expression.set_negation(Some(negation));
        }
        Some(current) if current == negation => expression.set_negation(None),
        Some(_) => return Err(ParseError::ConflictingNegation { location }),
    }

    Ok(expression)
}
