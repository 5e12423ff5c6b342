use crate::eval::{EvalError, Frame};
use crate::node::Node;
use crate::registry::{
    OperatorFlags, OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint,
};
use crate::value::{Truth, Value};

use super::{all_of, define};

const BOOL: &[TypeConstraint] = &[TypeConstraint::BooleanCoercible];

pub(super) fn register(registry: &mut OperatorRegistry) {
    define(
        registry,
        "true",
        Signature::new(0, Some(0), ReturnType::Boolean),
        OperatorHandler::eager(|_, _| Ok(Truth::KnownTrue.into())),
        "Always true.",
    );
    define(
        registry,
        "false",
        Signature::new(0, Some(0), ReturnType::Boolean),
        OperatorHandler::eager(|_, _| Ok(Truth::KnownFalse.into())),
        "Always false.",
    );
    define(
        registry,
        "and",
        Signature::new(1, None, ReturnType::Boolean).args(BOOL),
        OperatorHandler::lazy(|args, frame| {
            let mut all_known = true;
            for (index, arg) in args.iter().enumerate() {
                match frame.eval_arg(index, arg).truth() {
                    Truth::KnownTrue => {}
                    Truth::True => all_known = false,
                    other => return Ok(other.into()),
                }
            }
            Ok(settled_if(all_known, Truth::True).into())
        }),
        "True when every argument is true. Stops at the first false argument.",
    );
    define(
        registry,
        "and-in-sequence",
        Signature::new(1, None, ReturnType::Boolean).args(BOOL),
        OperatorHandler::lazy(and_in_sequence),
        "True once every argument has become true, in the order listed.",
    );
    define(
        registry,
        "or",
        Signature::new(1, None, ReturnType::Boolean).args(BOOL),
        OperatorHandler::lazy(|args, frame| {
            let mut all_known_false = true;
            let mut saw_unknown = false;
            for (index, arg) in args.iter().enumerate() {
                match frame.eval_arg(index, arg).truth() {
                    truth @ (Truth::True | Truth::KnownTrue) => return Ok(truth.into()),
                    Truth::KnownFalse => {}
                    Truth::False => all_known_false = false,
                    Truth::Unknown => {
                        all_known_false = false;
                        saw_unknown = true;
                    }
                }
            }
            Ok(if all_known_false {
                Truth::KnownFalse
            } else if saw_unknown {
                Truth::Unknown
            } else {
                Truth::False
            }
            .into())
        }),
        "True when any argument is true. Stops at the first true argument.",
    );
    define(
        registry,
        "not",
        Signature::new(1, Some(1), ReturnType::Boolean).args(BOOL),
        OperatorHandler::eager(|args, _| Ok(args[0].truth().negate().into())),
        "Logical negation; settled inputs stay settled.",
    );
    define(
        registry,
        "xor",
        Signature::new(2, Some(2), ReturnType::Boolean).args(BOOL),
        OperatorHandler::eager(|args, _| Ok(Value::bool(args[0].is_true() != args[1].is_true()))),
        "True when exactly one argument is true.",
    );
    define(
        registry,
        "when",
        Signature::new(2, None, ReturnType::Boolean)
            .args(&[TypeConstraint::BooleanCoercible, TypeConstraint::Any])
            .flags(OperatorFlags::SIDE_EFFECT),
        OperatorHandler::lazy(|args, frame| {
            let truth = frame.eval_arg(0, &args[0]).truth();
            if truth.is_true() {
                run_actions(args, frame);
            }
            Ok(truth.into())
        }),
        "Runs the remaining arguments when the first is true; returns the condition.",
    );
    define(
        registry,
        "every-time",
        Signature::new(2, None, ReturnType::Boolean)
            .args(&[TypeConstraint::BooleanCoercible, TypeConstraint::Any])
            .flags(OperatorFlags::SIDE_EFFECT),
        OperatorHandler::lazy(|args, frame| {
            if frame.eval_arg(0, &args[0]).is_true() {
                run_actions(args, frame);
            }
            Ok(Truth::False.into())
        }),
        "Like when, but always returns false so the owning event keeps evaluating.",
    );
    define(
        registry,
        "if-then-else",
        Signature::new(3, Some(3), ReturnType::Any).args(&[
            TypeConstraint::BooleanCoercible,
            TypeConstraint::Any,
            TypeConstraint::Any,
        ]),
        OperatorHandler::lazy(|args, frame| {
            Ok(match frame.eval_arg(0, &args[0]).truth() {
                Truth::Unknown => Value::Unknown,
                truth if truth.is_true() => frame.eval_arg(1, &args[1]),
                _ => frame.eval_arg(2, &args[2]),
            })
        }),
        "Evaluates the second argument when the first is true, else the third.",
    );
    define(
        registry,
        "is-indeterminate",
        Signature::new(1, Some(1), ReturnType::Boolean)
            .args(&[TypeConstraint::Any])
            .flags(OperatorFlags::ACCEPTS_UNKNOWN),
        OperatorHandler::eager(|args, _| Ok(Value::bool(args[0].is_unknown()))),
        "True when the argument could not be resolved.",
    );
}

fn settled_if(settled: bool, truth: Truth) -> Truth {
    match (settled, truth) {
        (true, Truth::True) => Truth::KnownTrue,
        (true, Truth::False) => Truth::KnownFalse,
        _ => truth,
    }
}

fn run_actions(args: &[Node], frame: &mut Frame<'_, '_>) {
    for (index, action) in args.iter().enumerate().skip(1) {
        frame.eval_arg(index, action);
    }
}

/// Latches the first time each argument was true and checks the latched
/// times never go backwards.
fn and_in_sequence(
    args: &[Node],
    frame: &mut Frame<'_, '_>,
) -> Result<Value, EvalError> {
    let now = frame.now();
    let base = frame.path();
    let formula_id = frame.formula_id().to_string();
    let mut latched = Vec::with_capacity(args.len());
    let mut truths = Vec::with_capacity(args.len());

    for (index, arg) in args.iter().enumerate() {
        let path = base.child(index + 1);
        let truth = frame.eval_arg(index, arg).truth();
        if truth.is_true() {
            latched.push(Some(frame.ledger().latch_true(&formula_id, &path, now)));
        } else {
            latched.push(frame.ledger().latched_at(&formula_id, &path));
        }
        truths.push(truth);
    }

    let times: Option<Vec<f64>> = latched.into_iter().collect();
    match times {
        Some(times) if times.windows(2).all(|pair| pair[0] <= pair[1]) => {
            Ok(all_of(truths.into_iter().map(|truth| match truth {
                Truth::KnownTrue => Truth::KnownTrue,
                _ => Truth::True,
            }))
            .into())
        }
        // Latched out of order; can never recover.
        Some(_) => Ok(Truth::KnownFalse.into()),
        None if truths.contains(&Truth::KnownFalse) => Ok(Truth::KnownFalse.into()),
        None => Ok(Truth::False.into()),
    }
}
