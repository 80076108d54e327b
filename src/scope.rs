use std::collections::HashMap;

use crate::ast::{Parameter, TypeSpecifier, VariableDefinition};
use crate::error::{EvalResult, RuntimeError};
use crate::value::Value;

/// A storage cell for one declared variable or bound parameter.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub var_type: TypeSpecifier,
    pub mutable: bool,
    pub optional: bool,
    value: Option<Value>,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        var_type: TypeSpecifier,
        mutable: bool,
        optional: bool,
    ) -> Self {
        Self {
            name: name.into(),
            var_type,
            mutable,
            optional,
            value: None,
        }
    }

    pub fn from_definition(definition: &VariableDefinition) -> Self {
        Self::new(
            definition.name.clone(),
            definition.var_type,
            definition.mutable,
            definition.optional,
        )
    }

    pub fn from_parameter(parameter: &Parameter) -> Self {
        Self::new(
            parameter.name.clone(),
            parameter.param_type,
            parameter.mutable,
            parameter.optional,
        )
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Current value; an unset variable reads as absent only when it is
    /// optional.
    pub fn value(&self) -> EvalResult<Option<Value>> {
        if self.value.is_none() && !self.optional {
            return Err(RuntimeError::MissingValue {
                name: self.name.clone(),
            });
        }
        Ok(self.value.clone())
    }

    /// Writes a new value. The first write to an unset variable is always
    /// allowed; later writes require `mut`.
    pub fn assign(&mut self, value: Option<Value>) -> EvalResult<()> {
        match &value {
            Some(v) if v.type_specifier() != self.var_type => {
                return Err(RuntimeError::MismatchedTypes {
                    name: self.name.clone(),
                    expected: self.var_type,
                    found: v.type_specifier(),
                });
            }
            None if !self.optional => {
                return Err(RuntimeError::MissingValue {
                    name: self.name.clone(),
                });
            }
            _ => {}
        }

        if self.is_set() && !self.mutable {
            return Err(RuntimeError::ReassignNonMutable {
                name: self.name.clone(),
            });
        }

        self.value = value;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, Variable>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, variable: Variable) -> EvalResult<()> {
        if self.variables.contains_key(&variable.name) {
            return Err(RuntimeError::VariableAlreadyDefined {
                name: variable.name,
            });
        }
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }
}

/// Variables of one function activation. The outermost scope holds the
/// parameters; every nested block pushes a scope that is dropped when the
/// block ends, so only writes to variables declared outside the block
/// outlive it.
#[derive(Debug)]
pub struct Frame {
    scopes: Vec<Scope>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn exit_scope(&mut self) {
        // The activation scope lives as long as the frame.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares in the innermost scope. Names never shadow within one
    /// activation.
    pub fn declare(&mut self, variable: Variable) -> EvalResult<()> {
        if self.contains(&variable.name) {
            return Err(RuntimeError::VariableAlreadyDefined {
                name: variable.name,
            });
        }
        self.shadow(variable)
    }

    /// Declares in the innermost scope, hiding an outer variable of the
    /// same name until the scope ends.
    pub fn shadow(&mut self, variable: Variable) -> EvalResult<()> {
        match self.scopes.last_mut() {
            Some(scope) => scope.declare(variable),
            None => Err(RuntimeError::VariableNotDeclared {
                name: variable.name,
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_variable(name: &str, mutable: bool, optional: bool) -> Variable {
        Variable::new(name, TypeSpecifier::Int, mutable, optional)
    }

    #[test]
    fn test_unset_variable_reads() {
        let optional = int_variable("x", false, true);
        assert_eq!(optional.value().unwrap(), None);

        let required = int_variable("y", false, false);
        assert!(matches!(
            required.value(),
            Err(RuntimeError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_immutable_variable_assigned_once() {
        let mut variable = int_variable("x", false, false);
        variable.assign(Some(Value::Int(1))).unwrap();
        assert_eq!(variable.value().unwrap(), Some(Value::Int(1)));

        assert!(matches!(
            variable.assign(Some(Value::Int(2))),
            Err(RuntimeError::ReassignNonMutable { .. })
        ));
    }

    #[test]
    fn test_mutable_variable_reassignment() {
        let mut variable = int_variable("x", true, false);
        for i in 0..5 {
            variable.assign(Some(Value::Int(i))).unwrap();
        }
        assert_eq!(variable.value().unwrap(), Some(Value::Int(4)));
    }

    #[test]
    fn test_assignment_is_type_checked() {
        let mut variable = int_variable("x", true, false);
        match variable.assign(Some(Value::Float(1.5))) {
            Err(RuntimeError::MismatchedTypes {
                expected, found, ..
            }) => {
                assert_eq!(expected, TypeSpecifier::Int);
                assert_eq!(found, TypeSpecifier::Float);
            }
            other => panic!("Expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_value_only_for_optional() {
        let mut optional = int_variable("x", true, true);
        optional.assign(Some(Value::Int(3))).unwrap();
        optional.assign(None).unwrap();
        assert!(!optional.is_set());

        let mut required = int_variable("y", true, false);
        assert!(matches!(
            required.assign(None),
            Err(RuntimeError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_scope_rejects_redeclaration() {
        let mut scope = Scope::new();
        scope.declare(int_variable("x", false, false)).unwrap();
        assert!(matches!(
            scope.declare(int_variable("x", true, false)),
            Err(RuntimeError::VariableAlreadyDefined { .. })
        ));
        assert!(!scope.get("x").unwrap().mutable);
    }

    #[test]
    fn test_block_declarations_are_discarded() {
        let mut frame = Frame::new();
        frame.declare(int_variable("outer", true, false)).unwrap();

        frame.enter_scope();
        frame.declare(int_variable("inner", false, false)).unwrap();
        frame
            .lookup_mut("outer")
            .unwrap()
            .assign(Some(Value::Int(7)))
            .unwrap();
        assert!(frame.lookup("inner").is_some());
        frame.exit_scope();

        assert!(frame.lookup("inner").is_none());
        assert_eq!(
            frame.lookup("outer").unwrap().value().unwrap(),
            Some(Value::Int(7))
        );
    }

    #[test]
    fn test_nested_block_cannot_shadow() {
        let mut frame = Frame::new();
        frame.declare(int_variable("x", false, false)).unwrap();
        frame.enter_scope();
        assert!(matches!(
            frame.declare(int_variable("x", false, false)),
            Err(RuntimeError::VariableAlreadyDefined { .. })
        ));
    }

    #[test]
    fn test_shadow_hides_outer_binding() {
        let mut frame = Frame::new();
        let mut outer = Variable::new("var", TypeSpecifier::Int, false, true);
        outer.assign(Some(Value::Int(1))).unwrap();
        frame.shadow(outer).unwrap();

        frame.enter_scope();
        let mut inner = Variable::new("var", TypeSpecifier::String, false, true);
        inner.assign(Some(Value::Str("inner".to_string()))).unwrap();
        frame.shadow(inner).unwrap();
        assert_eq!(
            frame.lookup("var").unwrap().value().unwrap(),
            Some(Value::Str("inner".to_string()))
        );

        frame.exit_scope();
        assert_eq!(
            frame.lookup("var").unwrap().value().unwrap(),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn test_activation_scope_survives_exit() {
        let mut frame = Frame::new();
        frame.declare(int_variable("param", false, false)).unwrap();
        frame.exit_scope();
        assert!(frame.lookup("param").is_some());

        frame.enter_scope();
        frame.declare(int_variable("local", false, false)).unwrap();
        frame.exit_scope();
        frame.exit_scope();
        assert!(frame.lookup("param").is_some());
        assert!(frame.lookup("local").is_none());
    }
}
