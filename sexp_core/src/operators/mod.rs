//! Built-in operator families.
//!
//! Each submodule exposes `register`, which appends its operators to a
//! registry. Registration order is the order operators are listed by tools.

mod arithmetic;
mod comparison;
mod game;
mod logic;
mod status;
mod strings;
mod variables;

use crate::eval::EvalError;
use crate::registry::{OperatorHandler, OperatorRegistry, Signature};
use crate::value::{Truth, Value};

pub fn register_builtins(registry: &mut OperatorRegistry) {
    logic::register(registry);
    arithmetic::register(registry);
    comparison::register(registry);
    strings::register(registry);
    game::register(registry);
    status::register(registry);
    variables::register(registry);
}

/// Registers a builtin. Builtin names are fixed, so a rejection means two
/// families claim the same name.
fn define(
    registry: &mut OperatorRegistry,
    name: &str,
    signature: Signature,
    handler: OperatorHandler,
    description: &'static str,
) {
    if let Err(err) = registry.register(name, signature, handler, description) {
        tracing::error!(target: "sexp::registry", error = %err, "registry.builtin_rejected");
        debug_assert!(false, "builtin operator rejected: {err}");
    }
}

pub(crate) fn number_arg(operator: &str, args: &[Value], index: usize) -> Result<f64, EvalError> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(EvalError::argument(operator, index, "number", other)),
        None => Err(EvalError::domain(operator, format!("missing argument {index}"))),
    }
}

pub(crate) fn text_arg<'v>(
    operator: &str,
    args: &'v [Value],
    index: usize,
) -> Result<&'v str, EvalError> {
    match args.get(index) {
        Some(Value::Text(text)) => Ok(text),
        Some(other) => Err(EvalError::argument(operator, index, "string", other)),
        None => Err(EvalError::domain(operator, format!("missing argument {index}"))),
    }
}

/// Conjunction over already computed truths, with the same rules `and`
/// applies: any false short-circuits, unknowns propagate, and the result is
/// settled only when every input is.
pub(crate) fn all_of(truths: impl IntoIterator<Item = Truth>) -> Truth {
    let mut all_known = true;
    for truth in truths {
        match truth {
            Truth::KnownFalse => return Truth::KnownFalse,
            Truth::False => return Truth::False,
            Truth::Unknown => return Truth::Unknown,
            Truth::True => all_known = false,
            Truth::KnownTrue => {}
        }
    }
    if all_known {
        Truth::KnownTrue
    } else {
        Truth::True
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_of_settles_only_when_every_input_settles() {
        assert_eq!(all_of([Truth::KnownTrue, Truth::KnownTrue]), Truth::KnownTrue);
        assert_eq!(all_of([Truth::KnownTrue, Truth::True]), Truth::True);
        assert_eq!(all_of([Truth::True, Truth::KnownFalse]), Truth::KnownFalse);
        assert_eq!(all_of([Truth::Unknown, Truth::KnownFalse]), Truth::Unknown);
    }

    #[test]
    fn every_builtin_registers() {
        let registry = OperatorRegistry::builtin();
        for name in [
            "true", "false", "and", "and-in-sequence", "or", "not", "xor", "when", "every-time",
            "if-then-else", "is-indeterminate", "+", "-", "*", "/", "mod", "min", "max", "abs",
            "rand", "=", "!=", "<", ">", "<=", ">=", "string-equals", "string-concatenate",
            "string-length", "number-to-string", "string-to-number", "mission-time",
            "has-time-elapsed", "is-destroyed", "has-arrived", "has-departed", "hits-left",
            "ship-exists", "wing-has-arrived", "percent-wing-destroyed", "is-event-true",
            "is-event-false", "is-event-true-delay", "is-goal-true", "is-goal-false",
            "modify-variable", "variable-is-set", "send-message", "spawn-wing", "self-destruct",
            "invalidate-goal", "validate-goal", "do-nothing",
        ] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }
}
