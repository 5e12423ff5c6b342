use crate::eval::{EvalError, Frame};
use crate::goals::GoalStatus;
use crate::ledger::EventRecord;
use crate::registry::{OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint};
use crate::value::{Truth, Value};

use super::{define, number_arg, text_arg};

fn event_record(
    operator: &str,
    args: &[Value],
    frame: &mut Frame<'_, '_>,
) -> Result<EventRecord, EvalError> {
    let name = text_arg(operator, args, 0)?;
    frame
        .ledger()
        .event(name)
        .cloned()
        .ok_or_else(|| EvalError::domain(operator, format!("no event named '{name}'")))
}

fn goal_status(
    operator: &str,
    args: &[Value],
    frame: &mut Frame<'_, '_>,
) -> Result<GoalStatus, EvalError> {
    let name = text_arg(operator, args, 0)?;
    frame
        .ledger()
        .goal(name)
        .map(|record| record.status)
        .ok_or_else(|| EvalError::domain(operator, format!("no goal named '{name}'")))
}

pub(super) fn register(registry: &mut OperatorRegistry) {
    let one_name = || {
        Signature::new(1, Some(1), ReturnType::Boolean).args(&[TypeConstraint::String])
    };

    define(
        registry,
        "is-event-true",
        one_name(),
        OperatorHandler::eager(|args, frame| {
            let record = event_record("is-event-true", args, frame)?;
            Ok(if record.trigger_count > 0 {
                Truth::KnownTrue
            } else if record.never_fires {
                Truth::KnownFalse
            } else {
                Truth::False
            }
            .into())
        }),
        "True once the named event has fired.",
    );
    define(
        registry,
        "is-event-false",
        one_name(),
        OperatorHandler::eager(|args, frame| {
            let record = event_record("is-event-false", args, frame)?;
            Ok(if record.never_fires {
                Truth::KnownTrue
            } else if record.trigger_count > 0 {
                Truth::KnownFalse
            } else {
                Truth::False
            }
            .into())
        }),
        "True once the named event can no longer fire.",
    );
    define(
        registry,
        "is-event-true-delay",
        Signature::new(2, Some(2), ReturnType::Boolean)
            .args(&[TypeConstraint::String, TypeConstraint::Number]),
        OperatorHandler::eager(|args, frame| {
            let delay = number_arg("is-event-true-delay", args, 1)?;
            let record = event_record("is-event-true-delay", args, frame)?;
            let now = frame.now();
            Ok(match record.first_fired_at {
                Some(fired_at) if now >= fired_at + delay => Truth::KnownTrue,
                Some(_) => Truth::False,
                None if record.never_fires => Truth::KnownFalse,
                None => Truth::False,
            }
            .into())
        }),
        "True once the named event fired at least the given seconds ago.",
    );
    define(
        registry,
        "is-goal-true",
        one_name(),
        OperatorHandler::eager(|args, frame| {
            Ok(match goal_status("is-goal-true", args, frame)? {
                GoalStatus::Complete => Truth::KnownTrue,
                GoalStatus::Failed => Truth::KnownFalse,
                GoalStatus::Incomplete => Truth::False,
            }
            .into())
        }),
        "True once the named goal is complete.",
    );
    define(
        registry,
        "is-goal-false",
        one_name(),
        OperatorHandler::eager(|args, frame| {
            Ok(match goal_status("is-goal-false", args, frame)? {
                GoalStatus::Failed => Truth::KnownTrue,
                GoalStatus::Complete => Truth::KnownFalse,
                GoalStatus::Incomplete => Truth::False,
            }
            .into())
        }),
        "True once the named goal has failed.",
    );
}
