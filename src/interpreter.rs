use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use crate::ast::{
    ConditionalBlock, Expression, FunctionCall, FunctionDefinition, JumpStatement, MatchCase,
    NotValue, Operator, Program, Statement, TypeSpecifier, VariableDefinition, MATCH_SUBJECT,
};
use crate::builtins::{Builtin, Console};
use crate::error::{EvalResult, RuntimeError};
use crate::scope::{Frame, Scope, Variable};
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;
pub const SUCCESS_MESSAGE: &str = "Program executed successfully";

const MAIN_FUNCTION: &str = "main";

/// Non-local control transfer bubbling up from nested statements.
#[derive(Debug, Clone, PartialEq)]
enum JumpSignal {
    Break,
    Continue,
    Return(Option<Value>),
}

pub struct Interpreter<'a> {
    program: &'a Program,
    functions: HashMap<&'a str, &'a FunctionDefinition>,
    globals: Scope,
    frames: Vec<Frame>,
    console: Console,
    max_call_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            functions: HashMap::new(),
            globals: Scope::new(),
            frames: Vec::new(),
            console: Console::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Source of lines for the `input` built-in (stdin by default).
    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.console = self.console.with_input(input);
        self
    }

    /// Keeps a copy of everything `print` writes, see [`Self::captured_output`].
    pub fn with_output_capture(mut self) -> Self {
        self.console = self.console.with_capture();
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn captured_output(&self) -> Option<&str> {
        self.console.captured()
    }

    /// Validates the program, initializes globals and runs `main`.
    pub fn execute(&mut self) -> EvalResult<String> {
        self.validate()?;

        let main = self
            .functions
            .get(MAIN_FUNCTION)
            .copied()
            .ok_or_else(|| RuntimeError::FunctionNotDeclared {
                name: MAIN_FUNCTION.to_string(),
            })?;
        if main.return_type != TypeSpecifier::Void {
            return Err(RuntimeError::IncorrectReturnType {
                function: main.name.clone(),
                expected: TypeSpecifier::Void,
                found: main.return_type,
            });
        }
        if !main.parameters.is_empty() {
            return Err(RuntimeError::WrongParameterCount {
                function: main.name.clone(),
                expected: 0,
                found: main.parameters.len(),
            });
        }

        self.frames.clear();
        self.initialize_globals()?;

        tracing::debug!("entering main");
        self.frames.push(Frame::new());
        let result = self.execute_function_body(main);
        self.frames.pop();
        result?;

        Ok(SUCCESS_MESSAGE.to_string())
    }

    fn validate(&mut self) -> EvalResult<()> {
        let program = self.program;
        self.functions.clear();

        for function in &program.functions {
            if Builtin::from_name(&function.name).is_some() {
                return Err(RuntimeError::RestrictedFunctionName {
                    name: function.name.clone(),
                });
            }
            if self.functions.insert(&function.name, function).is_some() {
                return Err(RuntimeError::FunctionAlreadyDefined {
                    name: function.name.clone(),
                });
            }
        }

        let mut globals = HashSet::new();
        for variable in &program.variables {
            if variable.name == MATCH_SUBJECT || !globals.insert(variable.name.as_str()) {
                return Err(RuntimeError::VariableAlreadyDefined {
                    name: variable.name.clone(),
                });
            }
        }

        Ok(())
    }

    fn initialize_globals(&mut self) -> EvalResult<()> {
        let program = self.program;
        self.globals = Scope::new();

        for definition in &program.variables {
            let variable = self.create_variable(definition)?;
            self.globals.declare(variable)?;
            tracing::debug!(name = %definition.name, "initialized global");
        }

        Ok(())
    }

    fn create_variable(&mut self, definition: &VariableDefinition) -> EvalResult<Variable> {
        let mut variable = Variable::from_definition(definition);
        if let Some(initializer) = &definition.value {
            let value = self.evaluate(initializer)?;
            variable.assign(value)?;
        }
        Ok(variable)
    }

    // Statements

    fn execute_function_body(&mut self, function: &FunctionDefinition) -> EvalResult<Option<Value>> {
        let value = match self.execute_statements(&function.body)? {
            None => None,
            Some(JumpSignal::Return(value)) => value,
            Some(_) => {
                return Err(RuntimeError::JumpOutsideLoop {
                    function: function.name.clone(),
                })
            }
        };

        if let Some(v) = &value {
            if v.type_specifier() != function.return_type {
                return Err(RuntimeError::IncorrectReturnType {
                    function: function.name.clone(),
                    expected: function.return_type,
                    found: v.type_specifier(),
                });
            }
        }

        Ok(value)
    }

    fn execute_statements(&mut self, statements: &[Statement]) -> EvalResult<Option<JumpSignal>> {
        for statement in statements {
            if let Some(signal) = self.execute_statement(statement)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    /// Runs statements in a block scope that is discarded afterwards.
    fn execute_block(&mut self, statements: &[Statement]) -> EvalResult<Option<JumpSignal>> {
        self.frame_mut()?.enter_scope();
        let result = self.execute_statements(statements);
        self.frame_mut()?.exit_scope();
        result
    }

    fn execute_statement(&mut self, statement: &Statement) -> EvalResult<Option<JumpSignal>> {
        match statement {
            Statement::VariableDefinition(definition) => {
                self.define_variable(definition)?;
                Ok(None)
            }
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(None)
            }
            Statement::IfElse {
                if_block,
                elif_blocks,
                else_body,
            } => self.execute_if_else(if_block, elif_blocks, else_body.as_deref()),
            Statement::While { condition, body } => self.execute_while(condition, body),
            Statement::Jump(jump) => self.execute_jump(jump).map(Some),
            Statement::Exist {
                target,
                body,
                else_body,
            } => {
                if self.evaluate(target)?.is_some() {
                    self.execute_block(body)
                } else {
                    self.execute_block(else_body)
                }
            }
            Statement::PatternMatching { subject, cases } => self.execute_match(subject, cases),
        }
    }

    fn define_variable(&mut self, definition: &VariableDefinition) -> EvalResult<()> {
        let variable = self.create_variable(definition)?;

        if variable.name == MATCH_SUBJECT || self.globals.contains(&variable.name) {
            return Err(RuntimeError::VariableAlreadyDefined {
                name: variable.name,
            });
        }
        self.frame_mut()?.declare(variable)
    }

    fn execute_if_else(
        &mut self,
        if_block: &ConditionalBlock,
        elif_blocks: &[ConditionalBlock],
        else_body: Option<&[Statement]>,
    ) -> EvalResult<Option<JumpSignal>> {
        for block in std::iter::once(if_block).chain(elif_blocks) {
            if self.test_condition(&block.condition)? {
                return self.execute_block(&block.body);
            }
        }

        match else_body {
            Some(body) => self.execute_block(body),
            None => Ok(None),
        }
    }

    fn execute_while(
        &mut self,
        condition: &Expression,
        body: &[Statement],
    ) -> EvalResult<Option<JumpSignal>> {
        while self.test_condition(condition)? {
            match self.execute_block(body)? {
                Some(JumpSignal::Break) => break,
                Some(JumpSignal::Continue) | None => continue,
                Some(signal) => return Ok(Some(signal)),
            }
        }
        Ok(None)
    }

    fn execute_jump(&mut self, jump: &JumpStatement) -> EvalResult<JumpSignal> {
        let signal = match jump {
            JumpStatement::Break => JumpSignal::Break,
            JumpStatement::Continue => JumpSignal::Continue,
            JumpStatement::Return(None) => JumpSignal::Return(None),
            JumpStatement::Return(Some(expression)) => {
                JumpSignal::Return(self.evaluate(expression)?)
            }
        };
        tracing::trace!(?signal, "jump");
        Ok(signal)
    }

    fn execute_match(
        &mut self,
        subject: &Expression,
        cases: &[MatchCase],
    ) -> EvalResult<Option<JumpSignal>> {
        let value = self.evaluate(subject)?;

        let var_type = value
            .as_ref()
            .map_or(TypeSpecifier::Unknown, Value::type_specifier);
        let mut bound = Variable::new(MATCH_SUBJECT, var_type, false, true);
        bound.assign(value)?;

        let frame = self.frame_mut()?;
        frame.enter_scope();
        frame.shadow(bound)?;
        let result = self.execute_match_cases(cases);
        self.frame_mut()?.exit_scope();
        result
    }

    fn execute_match_cases(&mut self, cases: &[MatchCase]) -> EvalResult<Option<JumpSignal>> {
        for case in cases {
            if self.test_condition(&case.condition)? {
                return self.execute_block(&case.body);
            }
        }
        Ok(None)
    }

    fn test_condition(&mut self, condition: &Expression) -> EvalResult<bool> {
        match self.require_value(condition, "condition")? {
            Value::Bool(value) => Ok(value),
            other => Err(RuntimeError::MismatchedTypes {
                name: "condition".to_string(),
                expected: TypeSpecifier::Bool,
                found: other.type_specifier(),
            }),
        }
    }

    // Expressions

    fn require_value(&mut self, expression: &Expression, context: &'static str) -> EvalResult<Value> {
        self.evaluate(expression)?
            .ok_or(RuntimeError::UnresolvedExpression { context })
    }

    /// Evaluates an expression; `None` is the absent value of an unset
    /// optional variable or of a function that returned nothing.
    fn evaluate(&mut self, expression: &Expression) -> EvalResult<Option<Value>> {
        match expression {
            Expression::Literal { value, negation } => {
                apply_negation(value.clone(), *negation, "literal").map(Some)
            }
            Expression::Variable { name, negation } => self
                .lookup(name)?
                .value()?
                .map(|value| apply_negation(value, *negation, name))
                .transpose(),
            Expression::Operator {
                left,
                operator: Operator::Assign,
                right,
                negation,
            } => self.evaluate_assignment(left, right, *negation),
            Expression::Operator {
                left,
                operator,
                right,
                negation,
            } => {
                let name = operation_name(*operator);
                let left = self.require_value(left, name)?;
                let right = self.require_value(right, name)?;
                let result = apply_operator(*operator, left, right)?;
                apply_negation(result, *negation, name).map(Some)
            }
            Expression::FunctionCall(call) => self.evaluate_call(call),
        }
    }

    fn evaluate_assignment(
        &mut self,
        target: &Expression,
        source: &Expression,
        negation: Option<NotValue>,
    ) -> EvalResult<Option<Value>> {
        if negation.is_some() {
            return Err(RuntimeError::NegatedAssignment);
        }

        let value = self.evaluate(source)?;

        let name = match target {
            Expression::Variable {
                name,
                negation: None,
            } => name,
            Expression::Variable { .. } => return Err(RuntimeError::NegatedAssignment),
            _ => {
                return Err(RuntimeError::UnresolvedExpression {
                    context: "assignment target",
                })
            }
        };

        self.lookup_mut(name)?.assign(value.clone())?;
        Ok(value)
    }

    fn evaluate_call(&mut self, call: &FunctionCall) -> EvalResult<Option<Value>> {
        let result = match Builtin::from_name(&call.name) {
            Some(builtin) => Some(self.call_builtin(builtin, &call.args)?),
            None => ensure_sufficient_stack(|| self.call_function(call))?,
        };

        result
            .map(|value| apply_negation(value, call.negation, &call.name))
            .transpose()
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Expression]) -> EvalResult<Value> {
        if args.len() != builtin.arity() {
            return Err(RuntimeError::WrongParameterCount {
                function: builtin.name().to_string(),
                expected: builtin.arity(),
                found: args.len(),
            });
        }

        let values = args
            .iter()
            .map(|arg| self.require_value(arg, "function argument"))
            .collect::<EvalResult<Vec<_>>>()?;
        builtin.call(values, &mut self.console)
    }

    #[tracing::instrument(level = "debug", skip(self, call), fields(function = %call.name))]
    fn call_function(&mut self, call: &FunctionCall) -> EvalResult<Option<Value>> {
        let function = self
            .functions
            .get(call.name.as_str())
            .copied()
            .ok_or_else(|| RuntimeError::FunctionNotDeclared {
                name: call.name.clone(),
            })?;

        check_parameters(function)?;
        if function.parameters.len() != call.args.len() {
            return Err(RuntimeError::WrongParameterCount {
                function: function.name.clone(),
                expected: function.parameters.len(),
                found: call.args.len(),
            });
        }

        // Arguments are evaluated in the caller's scope.
        let mut frame = Frame::new();
        for (parameter, arg) in function.parameters.iter().zip(&call.args) {
            let value = self.evaluate(arg)?;

            if parameter.name == MATCH_SUBJECT || self.globals.contains(&parameter.name) {
                return Err(RuntimeError::VariableAlreadyDefined {
                    name: parameter.name.clone(),
                });
            }

            let mut variable = Variable::from_parameter(parameter);
            if value.is_some() {
                variable.assign(value)?;
            }
            frame.declare(variable)?;
        }

        if self.frames.len() >= self.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                function: function.name.clone(),
                limit: self.max_call_depth,
            });
        }

        self.frames.push(frame);
        let result = self.execute_function_body(function);
        self.frames.pop();
        result
    }

    // Variable storage

    fn frame_mut(&mut self) -> EvalResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or(RuntimeError::UnresolvedExpression {
                context: "statement outside a function",
            })
    }

    /// Local variables first, then globals.
    fn lookup(&self, name: &str) -> EvalResult<&Variable> {
        self.frames
            .last()
            .and_then(|frame| frame.lookup(name))
            .or_else(|| self.globals.get(name))
            .ok_or_else(|| RuntimeError::VariableNotDeclared {
                name: name.to_string(),
            })
    }

    fn lookup_mut(&mut self, name: &str) -> EvalResult<&mut Variable> {
        let is_local = self
            .frames
            .last()
            .map_or(false, |frame| frame.contains(name));

        let variable = if is_local {
            self.frames.last_mut().and_then(|frame| frame.lookup_mut(name))
        } else {
            self.globals.get_mut(name)
        };

        variable.ok_or_else(|| RuntimeError::VariableNotDeclared {
            name: name.to_string(),
        })
    }
}

fn check_parameters(function: &FunctionDefinition) -> EvalResult<()> {
    let mut seen = HashSet::new();
    for parameter in &function.parameters {
        if !seen.insert(parameter.name.as_str()) {
            return Err(RuntimeError::ParameterAlreadyDeclared {
                parameter: parameter.name.clone(),
                function: function.name.clone(),
            });
        }
    }
    Ok(())
}

fn operation_name(operator: Operator) -> &'static str {
    match operator {
        Operator::Add => "addition",
        Operator::Sub => "subtraction",
        Operator::Multi => "multiplication",
        Operator::Div => "division",
        Operator::Modulo => "modulo",
        Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq => "comparison",
        Operator::Equal | Operator::NotEqual => "equality",
        Operator::And | Operator::Or => "logical",
        Operator::Assign => "assignment",
    }
}

fn apply_negation(value: Value, negation: Option<NotValue>, context: &str) -> EvalResult<Value> {
    match (negation, value) {
        (None, value) => Ok(value),
        (Some(NotValue::Arithmetic), Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow {
                operation: "negation",
            }),
        (Some(NotValue::Arithmetic), Value::Float(v)) => Ok(Value::Float(-v)),
        (Some(NotValue::Logical), Value::Bool(v)) => Ok(Value::Bool(!v)),
        (Some(NotValue::Arithmetic), other) => Err(RuntimeError::ArithmeticNegation {
            value_type: other.type_specifier(),
            context: context.to_string(),
        }),
        (Some(NotValue::Logical), other) => Err(RuntimeError::LogicalNegation {
            value_type: other.type_specifier(),
            context: context.to_string(),
        }),
    }
}

fn apply_operator(operator: Operator, left: Value, right: Value) -> EvalResult<Value> {
    let operation = operation_name(operator);
    if left.type_specifier() != right.type_specifier() {
        return Err(RuntimeError::MismatchedOperands {
            operation,
            left: left.type_specifier(),
            right: right.type_specifier(),
        });
    }

    match (operator, left, right) {
        (Operator::Add, Value::Str(l), Value::Str(r)) => Ok(Value::Str(l + &r)),
        (
            Operator::Add | Operator::Sub | Operator::Multi | Operator::Div | Operator::Modulo,
            Value::Int(l),
            Value::Int(r),
        ) => int_arithmetic(operator, l, r),
        (
            Operator::Add | Operator::Sub | Operator::Multi | Operator::Div | Operator::Modulo,
            Value::Float(l),
            Value::Float(r),
        ) => float_arithmetic(operator, l, r),
        (
            Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq,
            Value::Int(l),
            Value::Int(r),
        ) => Ok(Value::Bool(compare(operator, l, r))),
        (
            Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq,
            Value::Float(l),
            Value::Float(r),
        ) => Ok(Value::Bool(compare(operator, l, r))),
        (Operator::Equal, l, r) => Ok(Value::Bool(l == r)),
        (Operator::NotEqual, l, r) => Ok(Value::Bool(l != r)),
        (Operator::And, Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l && r)),
        (Operator::Or, Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(l || r)),
        (_, value, _) => Err(RuntimeError::IncorrectTypeInOperation {
            operation,
            value_type: value.type_specifier(),
        }),
    }
}

fn int_arithmetic(operator: Operator, l: i32, r: i32) -> EvalResult<Value> {
    let result = match operator {
        Operator::Add => l.checked_add(r),
        Operator::Sub => l.checked_sub(r),
        Operator::Multi => l.checked_mul(r),
        Operator::Div | Operator::Modulo if r == 0 => return Err(RuntimeError::DivisionByZero),
        Operator::Div => l.checked_div(r),
        _ => l.checked_rem(r),
    };

    result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow {
        operation: operation_name(operator),
    })
}

fn float_arithmetic(operator: Operator, l: f32, r: f32) -> EvalResult<Value> {
    let result = match operator {
        Operator::Add => l + r,
        Operator::Sub => l - r,
        Operator::Multi => l * r,
        Operator::Div | Operator::Modulo if r == 0.0 => return Err(RuntimeError::DivisionByZero),
        Operator::Div => l / r,
        _ => l % r,
    };
    Ok(Value::Float(result))
}

fn compare<T: PartialOrd>(operator: Operator, l: T, r: T) -> bool {
    match operator {
        Operator::Less => l < r,
        Operator::LessEq => l <= r,
        Operator::More => l > r,
        _ => l >= r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse(source: &str) -> Program {
        Parser::new(Lexer::new(source)).unwrap().parse().unwrap()
    }

    fn run(source: &str) -> EvalResult<String> {
        let program = parse(source);
        Interpreter::new(&program).execute()
    }

    /// Runs `main` and returns everything it printed.
    fn output_of(source: &str) -> String {
        let program = parse(source);
        let mut interpreter = Interpreter::new(&program).with_output_capture();
        interpreter.execute().unwrap();
        interpreter.captured_output().unwrap_or_default().to_string()
    }

    fn run_error(source: &str) -> RuntimeError {
        run(source).unwrap_err()
    }

    #[test]
    fn test_successful_execution_message() {
        assert_eq!(
            run("def void main() { int x = 1; }").unwrap(),
            SUCCESS_MESSAGE
        );
    }

    #[test]
    fn test_factorial() {
        let output = output_of(
            "def int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); }\n\
             def void main() { print(to_string(fact(5))); }",
        );
        assert_eq!(output, "120\n");
    }

    #[test]
    fn test_main_signature() {
        assert!(matches!(
            run_error("def int main() { return 1; }"),
            RuntimeError::IncorrectReturnType { .. }
        ));
        assert!(matches!(
            run_error("def void main(int a) { a; }"),
            RuntimeError::WrongParameterCount { .. }
        ));
        assert!(matches!(
            run_error("def void other() { return; }"),
            RuntimeError::FunctionNotDeclared { .. }
        ));
    }

    #[test]
    fn test_program_validation() {
        assert!(matches!(
            run_error("def void f() { return; } def void f() { return; } def void main() { f(); }"),
            RuntimeError::FunctionAlreadyDefined { .. }
        ));
        assert!(matches!(
            run_error("def void print() { return; } def void main() { return; }"),
            RuntimeError::RestrictedFunctionName { .. }
        ));
        assert!(matches!(
            run_error("int a = 1; int a = 2; def void main() { return; }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
        assert!(matches!(
            run_error("int var = 1; def void main() { return; }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
    }

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(
            output_of("def void main() { print(to_string(7 / 2)); print(to_string(-7 / 2)); }"),
            "3\n-3\n"
        );
        assert_eq!(
            output_of("def void main() { print(to_string(7.5 % 2.0)); }"),
            "1.5\n"
        );
        // The float remainder keeps the dividend's sign.
        assert_eq!(
            output_of("def void main() { print(to_string(-7.5 % 2.0)); print(to_string(7.5 % -2.0)); }"),
            "-1.5\n1.5\n"
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            run_error("def void main() { int x = 1 / 0; }"),
            RuntimeError::DivisionByZero
        ));
        assert!(matches!(
            run_error("def void main() { int x = 1 % 0; }"),
            RuntimeError::DivisionByZero
        ));
        assert!(matches!(
            run_error("def void main() { float x = 1.5 / 0.5; float y = x / (x - x); }"),
            RuntimeError::DivisionByZero
        ));
    }

    #[test]
    fn test_integer_overflow_is_checked() {
        assert!(matches!(
            run_error("def void main() { int x = 2147483647 + 1; }"),
            RuntimeError::IntegerOverflow {
                operation: "addition"
            }
        ));
        assert!(matches!(
            run_error("def void main() { int x = 65536 * 65536; }"),
            RuntimeError::IntegerOverflow { .. }
        ));
    }

    #[test]
    fn test_operand_types_must_match() {
        assert!(matches!(
            run_error("def void main() { int x = 1 + 2.5; }"),
            RuntimeError::MismatchedOperands { .. }
        ));
        assert!(matches!(
            run_error("def void main() { string s = \"a\" - \"b\"; }"),
            RuntimeError::IncorrectTypeInOperation { .. }
        ));
        assert!(matches!(
            run_error("def void main() { bool b = 1 && 2; }"),
            RuntimeError::IncorrectTypeInOperation { .. }
        ));
    }

    #[test]
    fn test_string_concatenation_and_equality() {
        assert_eq!(
            output_of(
                "def void main() { string s = \"ab\" + \"cd\"; \
                 if (s == \"abcd\" && true != false) { print(s); } }"
            ),
            "abcd\n"
        );
    }

    #[test]
    fn test_deferred_negation_on_results() {
        assert_eq!(
            output_of(
                "def int five() { return 5; }\n\
                 def void main() { int x = -(2 + 3); bool b = !(1 < 2); \
                 print(to_string(x)); print(to_string(b)); print(to_string(-five())); }"
            ),
            "-5\nfalse\n-5\n"
        );
        assert!(matches!(
            run_error("def void main() { int x = 1; bool b = !(x + 1); }"),
            RuntimeError::LogicalNegation { .. }
        ));
        assert!(matches!(
            run_error("def void main() { bool b = -(1 < 2); }"),
            RuntimeError::ArithmeticNegation { .. }
        ));
    }

    #[test]
    fn test_negated_assignment() {
        assert!(matches!(
            run_error("def void main() { mut int x = 1; -(x = 2); }"),
            RuntimeError::NegatedAssignment
        ));
    }

    #[test]
    fn test_mutability_rules() {
        assert!(matches!(
            run_error("def void main() { int x = 1; x = 2; }"),
            RuntimeError::ReassignNonMutable { .. }
        ));
        assert_eq!(
            output_of("def void main() { int x; x = 2; print(to_string(x)); }"),
            "2\n"
        );
        assert_eq!(
            output_of(
                "def void main() { mut int x = 0; x = 1; x = 2; x = 3; print(to_string(x)); }"
            ),
            "3\n"
        );
    }

    #[test]
    fn test_assignment_is_type_checked_and_chains() {
        assert!(matches!(
            run_error("def void main() { mut int x = 0; x = \"text\"; }"),
            RuntimeError::MismatchedTypes { .. }
        ));
        assert_eq!(
            output_of(
                "def void main() { mut int a = 0; mut int b = 0; a = b = 4; \
                 print(to_string(a + b)); }"
            ),
            "8\n"
        );
    }

    #[test]
    fn test_optional_and_missing_values() {
        assert_eq!(
            output_of(
                "def void main() { int? maybe; \
                 exist(maybe) { print(\"present\"); } else { print(\"absent\"); } }"
            ),
            "absent\n"
        );
        assert!(matches!(
            run_error("def void main() { int value; int other = value + 1; }"),
            RuntimeError::MissingValue { .. }
        ));
    }

    #[test]
    fn test_undeclared_names() {
        assert!(matches!(
            run_error("def void main() { x = 1; }"),
            RuntimeError::VariableNotDeclared { .. }
        ));
        assert!(matches!(
            run_error("def void main() { missing(); }"),
            RuntimeError::FunctionNotDeclared { .. }
        ));
    }

    #[test]
    fn test_redeclaration_in_function() {
        assert!(matches!(
            run_error("def void main() { int x = 1; if (true) { int x = 2; } }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
        assert!(matches!(
            run_error("int g = 1; def void main() { int g = 2; }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
        assert!(matches!(
            run_error("def void main() { int var = 2; }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
    }

    #[test]
    fn test_block_declarations_do_not_leak() {
        assert!(matches!(
            run_error("def void main() { if (true) { int inner = 1; } inner = 2; }"),
            RuntimeError::VariableNotDeclared { .. }
        ));
        assert_eq!(
            output_of(
                "def void main() { mut int total = 0; mut int i = 0; \
                 while (i < 3) { int step = i * 2; total = total + step; i = i + 1; } \
                 print(to_string(total)); }"
            ),
            "6\n"
        );
    }

    #[test]
    fn test_globals_are_shared() {
        assert_eq!(
            output_of(
                "mut int counter = 10;\n\
                 def void bump() { counter = counter + 1; }\n\
                 def void main() { bump(); bump(); print(to_string(counter)); }"
            ),
            "12\n"
        );
    }

    #[test]
    fn test_global_initializers_run_in_order() {
        assert_eq!(
            output_of(
                "int a = 2; int b = a * 3; def void main() { print(to_string(b)); }"
            ),
            "6\n"
        );
        assert!(matches!(
            run_error("int a = \"x\"; def void main() { return; }"),
            RuntimeError::MismatchedTypes { .. }
        ));
    }

    #[test]
    fn test_if_elif_else_takes_first_true_branch() {
        let source = |n: i32| {
            format!(
                "def void main() {{ int n = {}; \
                 if (n < 0) {{ print(\"negative\"); }} \
                 elif (n < 10) {{ print(\"small\"); }} \
                 elif (n < 100) {{ print(\"medium\"); }} \
                 else {{ print(\"large\"); }} }}",
                n
            )
        };
        assert_eq!(output_of(&source(5)), "small\n");
        assert_eq!(output_of(&source(50)), "medium\n");
        assert_eq!(output_of(&source(500)), "large\n");
        assert_eq!(
            output_of("def void main() { if (false) { print(\"x\"); } print(\"after\"); }"),
            "after\n"
        );
    }

    #[test]
    fn test_condition_must_be_bool() {
        assert!(matches!(
            run_error("def void main() { if (1) { return; } }"),
            RuntimeError::MismatchedTypes { .. }
        ));
    }

    #[test]
    fn test_while_with_break_and_continue() {
        assert_eq!(
            output_of(
                "def void main() { mut int i = 0; \
                 while (true) { i = i + 1; \
                 if (i % 2 == 0) { continue; } \
                 if (i > 7) { break; } \
                 print(to_string(i)); } }"
            ),
            "1\n3\n5\n7\n"
        );
    }

    #[test]
    fn test_return_from_inside_loop() {
        assert_eq!(
            output_of(
                "def int first_over(int limit) { mut int i = 0; \
                 while (true) { if (i * i > limit) { return i; } i = i + 1; } }\n\
                 def void main() { print(to_string(first_over(50))); }"
            ),
            "8\n"
        );
    }

    #[test]
    fn test_jump_outside_loop() {
        assert!(matches!(
            run_error("def void main() { break; }"),
            RuntimeError::JumpOutsideLoop { .. }
        ));
        assert!(matches!(
            run_error("def void f() { if (true) { continue; } }\ndef void main() { f(); }"),
            RuntimeError::JumpOutsideLoop { .. }
        ));
    }

    #[test]
    fn test_return_type_checks() {
        assert!(matches!(
            run_error("def int f() { return \"x\"; }\ndef void main() { f(); }"),
            RuntimeError::IncorrectReturnType { .. }
        ));
        assert!(matches!(
            run_error("def void f() { return 1; }\ndef void main() { f(); }"),
            RuntimeError::IncorrectReturnType { .. }
        ));
        assert!(matches!(
            run_error("def void f() { return; }\ndef void main() { int x = f(); }"),
            RuntimeError::MissingValue { .. }
        ));
    }

    #[test]
    fn test_parameter_checks() {
        assert!(matches!(
            run_error("def void f(int a, int a) { return; }\ndef void main() { f(1, 2); }"),
            RuntimeError::ParameterAlreadyDeclared { .. }
        ));
        assert!(matches!(
            run_error("def void f(int a) { return; }\ndef void main() { f(1, 2); }"),
            RuntimeError::WrongParameterCount {
                expected: 1,
                found: 2,
                ..
            }
        ));
        assert!(matches!(
            run_error("def void f(int a) { return; }\ndef void main() { f(1.5); }"),
            RuntimeError::MismatchedTypes { .. }
        ));
        assert!(matches!(
            run_error("int a = 1;\ndef void f(int a) { return; }\ndef void main() { f(1); }"),
            RuntimeError::VariableAlreadyDefined { .. }
        ));
    }

    #[test]
    fn test_absent_argument_for_optional_parameter() {
        assert_eq!(
            output_of(
                "def string describe(int? value) { \
                 exist(value) { return \"some\"; } else { return \"none\"; } }\n\
                 def void main() { int? nothing; print(describe(nothing)); print(describe(3)); }"
            ),
            "none\nsome\n"
        );
    }

    #[test]
    fn test_call_frames_are_isolated() {
        assert!(matches!(
            run_error("def void f() { local = 1; }\ndef void main() { mut int local = 0; f(); }"),
            RuntimeError::VariableNotDeclared { .. }
        ));
    }

    #[test]
    fn test_mutable_parameter() {
        assert_eq!(
            output_of(
                "def int twice(mut int n) { n = n * 2; return n; }\n\
                 def void main() { int n = 4; print(to_string(twice(n))); print(to_string(n)); }"
            ),
            "8\n4\n"
        );
    }

    #[test]
    fn test_match_takes_first_true_guard() {
        let source = |n: i32| {
            format!(
                "def int classify(int number) {{ \
                 match(number) {{ >10 => {{ return 11; }} >5 => {{ return 6; }} }} \
                 return 0; }}\n\
                 def void main() {{ print(to_string(classify({}))); }}",
                n
            )
        };
        assert_eq!(output_of(&source(15)), "11\n");
        assert_eq!(output_of(&source(7)), "6\n");
        assert_eq!(output_of(&source(5)), "0\n");
    }

    #[test]
    fn test_match_predicates_and_negation() {
        let source = "def bool even(int n) { return n % 2 == 0; }\n\
                      def void check(int n) { match(n) { \
                      !0 && even => { print(\"even\"); } \
                      ==0 => { print(\"zero\"); } \
                      !even => { print(\"odd\"); } } }\n\
                      def void main() { check(4); check(0); check(3); }";
        assert_eq!(output_of(source), "even\nzero\nodd\n");
    }

    #[test]
    fn test_nested_match_rebinds_subject() {
        assert_eq!(
            output_of(
                "def void main() { match(1) { ==1 => { \
                 match(\"inner\") { ==\"inner\" => { print(\"nested\"); } } \
                 match(true) { ==true => { print(\"again\"); } } } } }"
            ),
            "nested\nagain\n"
        );
    }

    #[test]
    fn test_builtins_cannot_be_shadowed_and_are_checked() {
        assert!(matches!(
            run_error("def void main() { print(1); }"),
            RuntimeError::MismatchedTypes { .. }
        ));
        assert!(matches!(
            run_error("def void main() { to_int(\"abc\"); }"),
            RuntimeError::InvalidConversion { .. }
        ));
        assert!(matches!(
            run_error("def void main() { print(\"a\", \"b\"); }"),
            RuntimeError::WrongParameterCount { .. }
        ));
    }

    #[test]
    fn test_input_builtin() {
        let program = parse("def void main() { string line = input(); print(line + \"!\"); }");
        let mut interpreter = Interpreter::new(&program)
            .with_input(std::io::Cursor::new("hello\n"))
            .with_output_capture();
        interpreter.execute().unwrap();
        assert_eq!(interpreter.captured_output(), Some("hello!\n"));
    }

    #[test]
    fn test_call_depth_limit() {
        let program = parse("def int down(int n) { return down(n + 1); }\ndef void main() { down(0); }");
        let mut interpreter = Interpreter::new(&program).with_max_call_depth(16);
        assert!(matches!(
            interpreter.execute(),
            Err(RuntimeError::CallDepthExceeded { limit: 16, .. })
        ));
    }

    #[test]
    fn test_default_depth_fits_on_test_thread() {
        let source = "def int down(int n) { if (n <= 0) { return 0; } return 1 + down(n - 1); }\n\
                      def void main() { print(to_string(down(250))); }";
        assert_eq!(output_of(source), "250\n");

        let program = parse(
            "def int down(int n) { if (n <= 0) { return 0; } return 1 + down(n - 1); }\n\
             def void main() { down(100000); }",
        );
        assert!(matches!(
            Interpreter::new(&program).execute(),
            Err(RuntimeError::CallDepthExceeded {
                limit: DEFAULT_MAX_CALL_DEPTH,
                ..
            })
        ));
    }

    #[test]
    fn test_output_before_failure_is_kept() {
        let program = parse("def void main() { print(\"before\"); int x = 1 / 0; }");
        let mut interpreter = Interpreter::new(&program).with_output_capture();
        assert!(interpreter.execute().is_err());
        assert_eq!(interpreter.captured_output(), Some("before\n"));
    }
}
