use crate::eval::EvalError;
use crate::registry::{
    OperatorFlags, OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint,
};
use crate::value::Value;

use super::{define, number_arg};

const NUM: &[TypeConstraint] = &[TypeConstraint::Number];

fn numbers(operator: &str, args: &[Value]) -> Result<Vec<f64>, EvalError> {
    (0..args.len())
        .map(|index| number_arg(operator, args, index))
        .collect()
}

fn fold(
    operator: &'static str,
    args: &[Value],
    step: impl Fn(f64, f64) -> Result<f64, EvalError>,
) -> Result<Value, EvalError> {
    let values = numbers(operator, args)?;
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| EvalError::domain(operator, "no operands"))?;
    let mut total = *first;
    for value in rest {
        total = step(total, *value)?;
    }
    if total.is_finite() {
        Ok(Value::Number(total))
    } else {
        Err(EvalError::domain(operator, "result is not finite"))
    }
}

pub(super) fn register(registry: &mut OperatorRegistry) {
    define(
        registry,
        "+",
        Signature::new(1, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| fold("+", args, |a, b| Ok(a + b))),
        "Sum of the arguments.",
    );
    define(
        registry,
        "-",
        Signature::new(1, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| {
            if args.len() == 1 {
                return Ok(Value::Number(-number_arg("-", args, 0)?));
            }
            fold("-", args, |a, b| Ok(a - b))
        }),
        "First argument minus the rest; negation with one argument.",
    );
    define(
        registry,
        "*",
        Signature::new(1, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| fold("*", args, |a, b| Ok(a * b))),
        "Product of the arguments.",
    );
    define(
        registry,
        "/",
        Signature::new(2, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| {
            fold("/", args, |a, b| {
                if b == 0.0 {
                    Err(EvalError::domain("/", "division by zero"))
                } else {
                    Ok(a / b)
                }
            })
        }),
        "First argument divided by each of the rest.",
    );
    define(
        registry,
        "mod",
        Signature::new(2, Some(2), ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| {
            fold("mod", args, |a, b| {
                if b == 0.0 {
                    Err(EvalError::domain("mod", "modulo by zero"))
                } else {
                    Ok(a % b)
                }
            })
        }),
        "Remainder of the first argument divided by the second.",
    );
    define(
        registry,
        "min",
        Signature::new(1, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| fold("min", args, |a, b| Ok(a.min(b)))),
        "Smallest argument.",
    );
    define(
        registry,
        "max",
        Signature::new(1, None, ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| fold("max", args, |a, b| Ok(a.max(b)))),
        "Largest argument.",
    );
    define(
        registry,
        "abs",
        Signature::new(1, Some(1), ReturnType::Number).args(NUM),
        OperatorHandler::eager(|args, _| Ok(Value::Number(number_arg("abs", args, 0)?.abs()))),
        "Absolute value.",
    );
    define(
        registry,
        "rand",
        Signature::new(2, Some(2), ReturnType::Number)
            .args(NUM)
            .flags(OperatorFlags::SIDE_EFFECT),
        OperatorHandler::eager(|args, frame| {
            let low = number_arg("rand", args, 0)?.trunc() as i64;
            let high = number_arg("rand", args, 1)?.trunc() as i64;
            if low > high {
                return Err(EvalError::domain("rand", format!("empty range {low}..={high}")));
            }
            Ok(Value::Number(frame.game().random_int(low, high) as f64))
        }),
        "Random integer between the two bounds, inclusive.",
    );
}
