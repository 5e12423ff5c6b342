use crate::eval::{EvalError, Frame};
use crate::node::Node;
use crate::registry::{
    OperatorFlags, OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint,
};
use crate::value::{Truth, Value};
use crate::variables::VariableError;

use super::define;

fn variable_target<'n>(operator: &str, node: &'n Node) -> Result<&'n str, EvalError> {
    node.variable_name().ok_or_else(|| EvalError::ArgumentMismatch {
        operator: operator.to_string(),
        index: 0,
        expected: TypeConstraint::VariableRef.as_str(),
        found: node.as_atom().map_or("list", |atom| atom.kind_name()),
    })
}

fn modify_variable(args: &[Node], frame: &mut Frame<'_, '_>) -> Result<Value, EvalError> {
    let name = variable_target("modify-variable", &args[0])?;
    let value = frame.eval_arg(1, &args[1]);
    if value.is_unknown() {
        // Keep the previous value rather than storing garbage.
        return Ok(Value::Unknown);
    }
    match frame.variables().set_value(name, &value) {
        Ok(()) => {
            tracing::debug!(
                target: "sexp::variables",
                variable = name,
                value = %value,
                "variables.modified"
            );
            Ok(Truth::True.into())
        }
        Err(VariableError::Undeclared(name)) => Err(EvalError::UnknownVariable(name)),
        Err(VariableError::TypeMismatch { expected, .. }) => Err(EvalError::ArgumentMismatch {
            operator: "modify-variable".to_string(),
            index: 1,
            expected: expected.as_str(),
            found: value.kind_name(),
        }),
        Err(other) => Err(EvalError::domain("modify-variable", other.to_string())),
    }
}

pub(super) fn register(registry: &mut OperatorRegistry) {
    define(
        registry,
        "modify-variable",
        Signature::new(2, Some(2), ReturnType::Action)
            .args(&[TypeConstraint::VariableRef, TypeConstraint::Any])
            .flags(OperatorFlags::SIDE_EFFECT),
        OperatorHandler::lazy(modify_variable),
        "Stores the second argument into the variable named by the first.",
    );
    define(
        registry,
        "variable-is-set",
        Signature::new(1, Some(1), ReturnType::Boolean).args(&[TypeConstraint::VariableRef]),
        OperatorHandler::lazy(|args, frame| {
            let name = variable_target("variable-is-set", &args[0])?;
            let entry = frame
                .variables()
                .entry(name)
                .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))?;
            Ok(Value::bool(entry.value != entry.default_value))
        }),
        "True when the variable no longer holds its default value.",
    );
}
