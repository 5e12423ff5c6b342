use crate::eval::EvalError;
use crate::registry::{OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint};
use crate::value::Value;

use super::{define, number_arg};

/// Compares the first argument against every other argument.
fn compare_first(
    operator: &'static str,
    args: &[Value],
    holds: fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    let first = number_arg(operator, args, 0)?;
    for index in 1..args.len() {
        if !holds(first, number_arg(operator, args, index)?) {
            return Ok(Value::bool(false));
        }
    }
    Ok(Value::bool(true))
}

pub(super) fn register(registry: &mut OperatorRegistry) {
    let table: [(&'static str, fn(f64, f64) -> bool, &'static str); 5] = [
        ("=", |a, b| a == b, "True when the first argument equals every other."),
        ("<", |a, b| a < b, "True when the first argument is less than every other."),
        (">", |a, b| a > b, "True when the first argument is greater than every other."),
        ("<=", |a, b| a <= b, "True when the first argument is at most every other."),
        (">=", |a, b| a >= b, "True when the first argument is at least every other."),
    ];
    for (name, holds, description) in table {
        define(
            registry,
            name,
            Signature::new(2, None, ReturnType::Boolean).args(&[TypeConstraint::Number]),
            OperatorHandler::eager(move |args, _| compare_first(name, args, holds)),
            description,
        );
    }
    define(
        registry,
        "!=",
        Signature::new(2, None, ReturnType::Boolean).args(&[TypeConstraint::Number]),
        OperatorHandler::eager(|args, _| {
            let first = number_arg("!=", args, 0)?;
            for index in 1..args.len() {
                if number_arg("!=", args, index)? == first {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        }),
        "True when the first argument differs from every other.",
    );
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use crate::value::Truth;

    #[test]
    fn comparisons_check_first_against_rest() {
        let mut h = Harness::new();
        assert!(h.eval("(= 2 2 2)").is_true());
        assert!(!h.eval("(= 2 2 3)").is_true());
        assert!(h.eval("(< 1 2 3)").is_true());
        assert!(!h.eval("(< 2 3 1)").is_true());
        assert!(h.eval("(>= 3 3 1)").is_true());
        assert!(h.eval("(<= -1 0)").is_true());
        assert!(h.eval("(!= 1 2 3)").is_true());
        assert!(!h.eval("(!= 1 2 1)").is_true());
        assert_eq!(h.eval("(> 1 2)").truth(), Truth::False);
    }

    #[test]
    fn unknown_operand_yields_unknown() {
        let mut h = Harness::new();
        assert!(h.eval("(> @nobody 100)").is_unknown());
    }
}
