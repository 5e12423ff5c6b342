//! Operator table: name → signature + handler.
//!
//! The table is append-only. Built-in operators are registered by
//! [`OperatorRegistry::builtin`]; hosts may register more before sharing the
//! registry behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

use crate::eval::{EvalError, Frame};
use crate::ledger::name_key;
use crate::node::Node;
use crate::operators;
use crate::value::Value;

/// Static result type of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Number,
    String,
    /// One of the truth sentinels.
    Boolean,
    /// Side-effecting statement; yields a truth sentinel.
    Action,
    /// Depends on the arguments (e.g. `if-then-else`).
    Any,
}

impl ReturnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnType::Number => "number",
            ReturnType::String => "string",
            ReturnType::Boolean => "boolean",
            ReturnType::Action => "action",
            ReturnType::Any => "any",
        }
    }
}

/// Shape an argument must have, checked statically by the validate pass and
/// dynamically against realized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeConstraint {
    Number,
    String,
    BooleanCoercible,
    ShipRef,
    WingRef,
    /// A bare `@name` atom; never evaluated.
    VariableRef,
    Any,
}

impl TypeConstraint {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeConstraint::Number => "number",
            TypeConstraint::String => "string",
            TypeConstraint::BooleanCoercible => "boolean",
            TypeConstraint::ShipRef => "ship",
            TypeConstraint::WingRef => "wing",
            TypeConstraint::VariableRef => "variable",
            TypeConstraint::Any => "any",
        }
    }

    /// Whether an operator returning `ty` may feed this argument.
    pub fn accepts_return(self, ty: ReturnType) -> bool {
        match (self, ty) {
            (TypeConstraint::Any, _) | (_, ReturnType::Any) => true,
            (TypeConstraint::Number, ReturnType::Number) => true,
            (TypeConstraint::String | TypeConstraint::ShipRef | TypeConstraint::WingRef, ReturnType::String) => true,
            (
                TypeConstraint::BooleanCoercible,
                ReturnType::Boolean | ReturnType::Action | ReturnType::Number,
            ) => true,
            _ => false,
        }
    }

    /// Whether a realized value has the right shape.
    pub fn accepts_value(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Unknown) => true,
            (TypeConstraint::Any, _) => true,
            (TypeConstraint::Number | TypeConstraint::BooleanCoercible, Value::Number(_)) => true,
            (TypeConstraint::String | TypeConstraint::ShipRef | TypeConstraint::WingRef, Value::Text(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperatorFlags: u8 {
        /// Evaluation changes host or mission state.
        const SIDE_EFFECT = 0b0001;
        /// Handler runs even when an argument evaluated to `Unknown`.
        const ACCEPTS_UNKNOWN = 0b0010;
        /// Handler receives raw argument nodes. Set from the handler kind at
        /// registration.
        const LAZY = 0b0100;
    }
}

pub type EagerFn = dyn Fn(&[Value], &mut Frame<'_, '_>) -> Result<Value, EvalError> + Send + Sync;
pub type LazyFn = dyn Fn(&[Node], &mut Frame<'_, '_>) -> Result<Value, EvalError> + Send + Sync;

/// How an operator receives its arguments.
#[derive(Clone)]
pub enum OperatorHandler {
    /// Arguments are evaluated first and checked against the signature.
    Eager(Arc<EagerFn>),
    /// The handler receives the raw argument nodes and evaluates them itself.
    Lazy(Arc<LazyFn>),
}

impl OperatorHandler {
    pub fn eager<F>(handler: F) -> Self
    where
        F: Fn(&[Value], &mut Frame<'_, '_>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        OperatorHandler::Eager(Arc::new(handler))
    }

    pub fn lazy<F>(handler: F) -> Self
    where
        F: Fn(&[Node], &mut Frame<'_, '_>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        OperatorHandler::Lazy(Arc::new(handler))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, OperatorHandler::Lazy(_))
    }
}

impl fmt::Debug for OperatorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorHandler::Eager(_) => f.write_str("Eager(..)"),
            OperatorHandler::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub min_args: usize,
    /// `None` for variadic operators.
    pub max_args: Option<usize>,
    /// Constraint per argument position. When there are more arguments than
    /// constraints the last constraint repeats.
    pub arg_types: Vec<TypeConstraint>,
    pub return_type: ReturnType,
    pub flags: OperatorFlags,
}

impl Signature {
    pub fn new(min_args: usize, max_args: Option<usize>, return_type: ReturnType) -> Self {
        Self {
            min_args,
            max_args,
            arg_types: Vec::new(),
            return_type,
            flags: OperatorFlags::empty(),
        }
    }

    pub fn args(mut self, arg_types: &[TypeConstraint]) -> Self {
        self.arg_types = arg_types.to_vec();
        self
    }

    pub fn flags(mut self, flags: OperatorFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn constraint_at(&self, index: usize) -> TypeConstraint {
        self.arg_types
            .get(index)
            .or_else(|| self.arg_types.last())
            .copied()
            .unwrap_or(TypeConstraint::Any)
    }

    pub fn accepts_count(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human readable arity, e.g. `2`, `1..3` or `1+`.
    pub fn arity_label(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{}..{}", self.min_args, max),
            None => format!("{}+", self.min_args),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperatorSpec {
    pub name: String,
    pub signature: Signature,
    pub handler: OperatorHandler,
    pub description: &'static str,
}

impl OperatorSpec {
    pub fn is_lazy(&self) -> bool {
        self.handler.is_lazy()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operator '{0}' is already registered")]
    Duplicate(String),
    #[error("operator name '{0}' is not a valid bare token")]
    InvalidName(String),
}

#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: Vec<OperatorSpec>,
    by_name: HashMap<String, usize>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every built-in operator.
    pub fn builtin() -> Arc<Self> {
        let mut registry = Self::new();
        operators::register_builtins(&mut registry);
        Arc::new(registry)
    }

    pub fn register(
        &mut self,
        name: &str,
        mut signature: Signature,
        handler: OperatorHandler,
        description: &'static str,
    ) -> Result<(), RegistryError> {
        if name.is_empty()
            || name.starts_with('@')
            || name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';'))
        {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let key = name_key(name);
        if self.by_name.contains_key(&key) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        signature.flags.set(OperatorFlags::LAZY, handler.is_lazy());
        self.by_name.insert(key, self.operators.len());
        self.operators.push(OperatorSpec {
            name: name.to_string(),
            signature,
            handler,
            description,
        });
        Ok(())
    }

    /// Operator names are matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&OperatorSpec> {
        self.by_name
            .get(&name_key(name))
            .map(|&index| &self.operators[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name_key(name))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OperatorSpec> {
        self.operators.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> OperatorHandler {
        OperatorHandler::eager(|_, _| Ok(Value::bool(true)))
    }

    #[test]
    fn registration_is_append_only() {
        let mut registry = OperatorRegistry::new();
        registry
            .register("ping", Signature::new(0, Some(0), ReturnType::Boolean), noop(), "")
            .unwrap();
        let err = registry
            .register("PING", Signature::new(0, Some(0), ReturnType::Boolean), noop(), "")
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("PING".into()));
        assert!(registry.get("Ping").is_some());
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.register("bad name", Signature::new(0, None, ReturnType::Any), noop(), ""),
            Err(RegistryError::InvalidName(_))
        ));
    }

    #[test]
    fn last_constraint_repeats_for_variadic_arguments() {
        let signature = Signature::new(1, None, ReturnType::Number)
            .args(&[TypeConstraint::String, TypeConstraint::Number]);
        assert_eq!(signature.constraint_at(0), TypeConstraint::String);
        assert_eq!(signature.constraint_at(5), TypeConstraint::Number);
        assert!(signature.accepts_count(12));
        assert!(!signature.accepts_count(0));
        assert_eq!(signature.arity_label(), "1+");
    }

    #[test]
    fn builtin_registry_marks_short_circuit_operators_lazy() {
        let registry = OperatorRegistry::builtin();
        for name in ["and", "or", "when", "every-time", "if-then-else"] {
            let spec = registry.get(name).unwrap();
            assert!(spec.is_lazy(), "{name} should be lazy");
            assert!(spec.signature.flags.contains(OperatorFlags::LAZY));
        }
        for name in ["+", ">", "not", "is-destroyed", "send-message"] {
            assert!(!registry.get(name).unwrap().is_lazy(), "{name} should be eager");
        }
    }

    #[test]
    fn boolean_constraint_accepts_numbers_but_not_strings() {
        assert!(TypeConstraint::BooleanCoercible.accepts_return(ReturnType::Number));
        assert!(!TypeConstraint::BooleanCoercible.accepts_return(ReturnType::String));
        assert!(!TypeConstraint::Number.accepts_return(ReturnType::Boolean));
        assert!(TypeConstraint::ShipRef.accepts_value(&Value::Text("Alpha 1".into())));
        assert!(!TypeConstraint::ShipRef.accepts_value(&Value::Number(1.0)));
    }
}
